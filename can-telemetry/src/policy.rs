//! Publish policy
//!
//! Per-signal rate limiter and deadband. A freshly decoded value is emitted
//! only when the minimum interval has elapsed since the last emission AND the
//! value moved by at least the tolerance from the last *emitted* value.
//! Rejected samples are dropped without touching the state.

use crate::types::{Result, TelemetryError, Timestamp};

/// The last value a policy let through
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastEmission {
    pub value: f64,
    pub timestamp_ms: Timestamp,
}

/// Publish decision state of one managed signal
#[derive(Debug, Clone, PartialEq)]
pub struct PublishPolicy {
    min_interval_ms: u64,
    tolerance: f64,
    last: Option<LastEmission>,
}

impl PublishPolicy {
    /// Create a policy with no emission history
    ///
    /// The tolerance must be a finite, non-negative number.
    pub fn new(min_interval_ms: u64, tolerance: f64) -> Result<Self> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(TelemetryError::InvalidPolicy(format!(
                "tolerance must be finite and >= 0, got {}",
                tolerance
            )));
        }

        Ok(Self {
            min_interval_ms,
            tolerance,
            last: None,
        })
    }

    /// Minimum time between two emissions
    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_ms
    }

    /// Minimum change between two emissions
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// The last accepted emission, if any
    pub fn last_emission(&self) -> Option<LastEmission> {
        self.last
    }

    /// Decide without updating state
    ///
    /// A policy that has never emitted accepts its first sample. A clock that
    /// appears to run backwards yields an elapsed time of zero.
    pub fn would_emit(&self, value: f64, now: Timestamp) -> bool {
        let Some(last) = self.last else {
            return true;
        };

        let elapsed = now.saturating_sub(last.timestamp_ms);
        elapsed >= self.min_interval_ms && (value - last.value).abs() >= self.tolerance
    }

    /// Decide and, on acceptance, record the value as the last emission
    pub fn should_emit(&mut self, value: f64, now: Timestamp) -> bool {
        if !self.would_emit(value, now) {
            return false;
        }

        self.last = Some(LastEmission {
            value,
            timestamp_ms: now,
        });
        true
    }

    /// Forget the emission history so the next sample is emitted
    pub fn reset(&mut self) {
        self.last = None;
    }
}
