//! Frame dispatcher
//!
//! Routes each incoming frame to the signals registered on its identifier:
//! decode, ask the signal's publish policy, collect what passed. One dispatch
//! call runs to completion before the next frame is looked at; its cost is
//! bounded by the number of signals sharing the identifier.

use crate::config::GatewayConfig;
use crate::frame_decoder::FrameDecoder;
use crate::io::{FrameSource, TransportSink};
use crate::registry::{Registry, RegistryStats};
use crate::types::{Emission, Frame};
use std::sync::{Arc, Mutex, PoisonError};

/// Counters maintained by a dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Frames handed to `dispatch`
    pub frames_processed: u64,
    /// Frames dropped by the channel/message filters
    pub frames_filtered: u64,
    /// Frames with at least one registered signal
    pub frames_matched: u64,
    /// Signal values decoded
    pub samples_decoded: u64,
    /// Values accepted by their publish policy
    pub emissions: u64,
    /// Accepted values the transport failed to take
    pub delivery_failures: u64,
}

/// Outcome of one [`Dispatcher::drain`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub frames: usize,
    pub emissions: usize,
    pub delivery_failures: usize,
}

/// The dispatcher: owns the registry and all policy state
pub struct Dispatcher {
    registry: Registry,
    config: GatewayConfig,
    stats: DispatchStats,
    /// Reused between drained frames
    scratch: Vec<Emission>,
}

impl Dispatcher {
    /// Create a dispatcher over a fully built registry
    pub fn new(registry: Registry) -> Self {
        Self::with_config(registry, GatewayConfig::default())
    }

    /// Create a dispatcher that applies the configuration's frame filters
    pub fn with_config(registry: Registry, config: GatewayConfig) -> Self {
        let stats = registry.stats();
        log::info!(
            "Dispatcher ready: {} signals on {} frame IDs",
            stats.num_signals,
            stats.num_frames
        );

        Self {
            registry,
            config,
            stats: DispatchStats::default(),
            scratch: Vec::new(),
        }
    }

    /// Decode a frame and return every value its policies accept
    ///
    /// Results are in registration order. A frame with no registered signals
    /// returns an empty list without decoding anything.
    pub fn dispatch(&mut self, frame: &Frame) -> Vec<Emission> {
        let mut out = Vec::new();
        self.dispatch_into(frame, &mut out);
        out
    }

    /// Like [`dispatch`](Self::dispatch), appending to a caller-owned buffer
    ///
    /// Returns the number of emissions appended.
    pub fn dispatch_into(&mut self, frame: &Frame, out: &mut Vec<Emission>) -> usize {
        self.stats.frames_processed += 1;

        if !self.config.should_process_frame(frame.channel, frame.id) {
            self.stats.frames_filtered += 1;
            return 0;
        }

        let Some((handles, signals)) = self.registry.route(frame.id) else {
            log::trace!("No signals for ID 0x{:X}", frame.id);
            return 0;
        };
        self.stats.frames_matched += 1;

        let before = out.len();
        for handle in handles {
            let signal = &mut signals[handle.index()];
            let value = FrameDecoder::decode(frame, signal.descriptor());
            self.stats.samples_decoded += 1;

            if signal.policy_mut().should_emit(value, frame.timestamp_ms) {
                log::debug!(
                    "Emit {} = {} (ID 0x{:X}, t={} ms)",
                    signal.descriptor().name,
                    value,
                    frame.id,
                    frame.timestamp_ms
                );
                out.push(Emission {
                    descriptor: Arc::clone(signal.descriptor()),
                    value,
                    timestamp_ms: frame.timestamp_ms,
                });
            } else {
                log::trace!("Dropped {} = {}", signal.descriptor().name, value);
            }
        }

        let emitted = out.len() - before;
        self.stats.emissions += emitted as u64;
        emitted
    }

    /// Pull frames from `source` until it is empty or `max_frames` were taken
    ///
    /// Every accepted value is handed to `sink`. A failed delivery is logged
    /// and counted; the policy state has already advanced and stays advanced.
    pub fn drain<S, T>(&mut self, mut source: S, mut sink: T, max_frames: usize) -> DrainSummary
    where
        S: FrameSource,
        T: TransportSink,
    {
        let mut summary = DrainSummary::default();
        let mut scratch = std::mem::take(&mut self.scratch);

        while summary.frames < max_frames {
            let Some(frame) = source.try_receive() else {
                break;
            };
            summary.frames += 1;

            scratch.clear();
            self.dispatch_into(&frame, &mut scratch);

            for emission in &scratch {
                summary.emissions += 1;
                if let Err(e) = sink.emit(emission) {
                    log::warn!("Failed to deliver {} to {}: {}", emission.name(), emission.destination(), e);
                    summary.delivery_failures += 1;
                    self.stats.delivery_failures += 1;
                }
            }
        }

        scratch.clear();
        self.scratch = scratch;
        summary
    }

    /// Clear every signal's emission history so its next sample is emitted
    pub fn force_publish_all(&mut self) {
        self.registry.force_publish_all();
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Get statistics about the registry
    pub fn registry_stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    /// Give the registry back (teardown)
    pub fn into_registry(self) -> Registry {
        self.registry
    }
}

/// A dispatcher behind a lock, for several bus channels on several threads
///
/// Use this when the channels cannot be given disjoint frame identifiers.
/// The whole registry is locked for one dispatch call.
#[derive(Clone)]
pub struct SharedDispatcher {
    inner: Arc<Mutex<Dispatcher>>,
}

impl SharedDispatcher {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            inner: Arc::new(Mutex::new(dispatcher)),
        }
    }

    /// Dispatch one frame under the lock
    pub fn dispatch(&self, frame: &Frame) -> Vec<Emission> {
        self.with(|d| d.dispatch(frame))
    }

    /// Run a closure with exclusive access to the dispatcher
    ///
    /// A panic on another thread does not leave the policy state half
    /// updated (each decision writes both fields at once), so a poisoned
    /// lock is recovered.
    pub fn with<R>(&self, f: impl FnOnce(&mut Dispatcher) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn stats(&self) -> DispatchStats {
        self.with(|d| d.stats())
    }
}
