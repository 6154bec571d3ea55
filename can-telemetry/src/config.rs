//! Gateway configuration types
//!
//! This module defines the configuration the core needs: the publish interval
//! tiers signals are registered with, and the frame filters a dispatcher
//! applies before decoding. Transport and bus settings belong to the
//! application layer.

use serde::{Deserialize, Serialize};

/// Named publish interval tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishTier {
    /// Fast-changing values (state of charge, power, speed)
    Fast,
    /// Temperatures and voltages
    Mid,
    /// Statistics and capacity figures
    Slow,
}

/// Minimum re-emission intervals per tier, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishIntervals {
    #[serde(default = "default_fast_ms")]
    pub fast_ms: u64,

    #[serde(default = "default_mid_ms")]
    pub mid_ms: u64,

    #[serde(default = "default_slow_ms")]
    pub slow_ms: u64,
}

fn default_fast_ms() -> u64 {
    60_000
}

fn default_mid_ms() -> u64 {
    300_000
}

fn default_slow_ms() -> u64 {
    3_600_000
}

impl Default for PublishIntervals {
    fn default() -> Self {
        Self {
            fast_ms: default_fast_ms(),
            mid_ms: default_mid_ms(),
            slow_ms: default_slow_ms(),
        }
    }
}

impl PublishIntervals {
    /// Interval for a tier
    pub fn for_tier(&self, tier: PublishTier) -> u64 {
        match tier {
            PublishTier::Fast => self.fast_ms,
            PublishTier::Mid => self.mid_ms,
            PublishTier::Slow => self.slow_ms,
        }
    }
}

/// Configuration for the registry and dispatcher
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Publish interval tiers
    #[serde(default)]
    pub intervals: PublishIntervals,

    /// Optional: only dispatch frames from these bus channels
    #[serde(default)]
    pub channel_filter: Option<Vec<u8>>,

    /// Optional: only dispatch these frame identifiers
    #[serde(default)]
    pub message_filter: Option<Vec<u32>>,
}

impl GatewayConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set all interval tiers
    pub fn with_intervals(mut self, intervals: PublishIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    /// Builder method: set channel filter
    pub fn with_channel_filter(mut self, channels: Vec<u8>) -> Self {
        self.channel_filter = Some(channels);
        self
    }

    /// Builder method: set message filter
    pub fn with_message_filter(mut self, messages: Vec<u32>) -> Self {
        self.message_filter = Some(messages);
        self
    }

    /// Interval for a tier under this configuration
    pub fn interval_ms(&self, tier: PublishTier) -> u64 {
        self.intervals.for_tier(tier)
    }

    /// Check if a channel should be processed
    pub fn should_process_channel(&self, channel: u8) -> bool {
        match &self.channel_filter {
            Some(channels) => channels.contains(&channel),
            None => true,
        }
    }

    /// Check if a frame identifier should be processed
    pub fn should_process_message(&self, frame_id: u32) -> bool {
        match &self.message_filter {
            Some(messages) => messages.contains(&frame_id),
            None => true,
        }
    }

    /// Check if a frame should be processed based on filters
    pub fn should_process_frame(&self, channel: u8, frame_id: u32) -> bool {
        self.should_process_channel(channel) && self.should_process_message(frame_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tiers() {
        let config = GatewayConfig::new();
        assert_eq!(config.interval_ms(PublishTier::Fast), 60_000);
        assert_eq!(config.interval_ms(PublishTier::Mid), 300_000);
        assert_eq!(config.interval_ms(PublishTier::Slow), 3_600_000);
    }

    #[test]
    fn test_filter_logic() {
        let config = GatewayConfig::new()
            .with_channel_filter(vec![0])
            .with_message_filter(vec![0x42F, 0x645]);

        assert!(config.should_process_frame(0, 0x42F));
        assert!(config.should_process_frame(0, 0x645));
        assert!(!config.should_process_frame(1, 0x42F)); // Wrong channel
        assert!(!config.should_process_frame(0, 0x140)); // Wrong message
    }

    #[test]
    fn test_no_filters() {
        let config = GatewayConfig::new();
        assert!(config.should_process_frame(0, 0x123));
        assert!(config.should_process_frame(99, 0x1FFF_FFFF));
    }

    #[test]
    fn test_partial_interval_table() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [intervals]
            fast_ms = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.intervals.fast_ms, 1000);
        assert_eq!(config.intervals.mid_ms, 300_000);
        assert!(config.channel_filter.is_none());
    }
}
