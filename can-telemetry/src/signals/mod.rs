//! Signal descriptors and descriptor sources
//!
//! Descriptors come from three places: the compiled-in vehicle catalog, TOML
//! descriptor tables and DBC files. Every source yields [`SignalDefinition`]s,
//! which the registry turns into managed signals. None of this code decodes
//! frames.

pub mod catalog;
pub mod dbc;
pub mod descriptor;
pub mod table;

pub use descriptor::{SignalDescriptor, REGISTER_BITS};

use crate::config::{GatewayConfig, PublishTier};

/// How long a signal must wait between emissions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PublishInterval {
    /// Resolved from the configured tiers at registration time
    Tier(PublishTier),
    /// Fixed interval in milliseconds
    Millis(u64),
}

impl PublishInterval {
    /// Resolve to milliseconds under a configuration
    pub fn resolve(&self, config: &GatewayConfig) -> u64 {
        match *self {
            PublishInterval::Tier(tier) => config.interval_ms(tier),
            PublishInterval::Millis(ms) => ms,
        }
    }
}

/// A descriptor together with the publish policy it should be registered with
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDefinition {
    pub descriptor: SignalDescriptor,
    pub interval: PublishInterval,
    /// Minimum change (in the signal's unit) that justifies re-emission
    pub tolerance: f64,
}

impl SignalDefinition {
    pub const fn new(descriptor: SignalDescriptor, interval: PublishInterval, tolerance: f64) -> Self {
        Self {
            descriptor,
            interval,
            tolerance,
        }
    }
}
