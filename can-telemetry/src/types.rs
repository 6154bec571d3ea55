//! Core types for the CAN telemetry core
//!
//! This module defines the frame model the dispatcher consumes, the emission
//! record it produces, and the crate-wide error type. Frames are plain values:
//! the dispatcher borrows one for the duration of a dispatch call and never
//! retains it.

use crate::signals::SignalDescriptor;
use std::fmt;
use std::sync::Arc;

/// Monotonic timestamp in milliseconds
pub type Timestamp = u64;

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Largest identifier representable in a standard (11-bit) frame
pub const STANDARD_ID_MAX: u32 = 0x7FF;

/// Largest identifier representable in an extended (29-bit) frame
pub const EXTENDED_ID_MAX: u32 = 0x1FFF_FFFF;

/// Raw CAN frame as handed over by the frame source
///
/// Classic CAN only: at most 8 data bytes. The declared length may be shorter
/// than the byte buffer; bytes past the declared length are never read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Capture time from the monotonic clock
    pub timestamp_ms: Timestamp,
    /// Bus channel the frame was received on (0, 1, ...)
    pub channel: u8,
    /// CAN identifier (11-bit or 29-bit)
    pub id: u32,
    len: u8,
    data: [u8; 8],
}

impl Frame {
    /// Maximum number of data bytes in a classic CAN frame
    pub const MAX_LEN: usize = 8;

    /// Create a frame on channel 0 from up to 8 data bytes
    ///
    /// Extra bytes beyond 8 are ignored and the declared length is clamped.
    pub fn new(id: u32, data: &[u8], timestamp_ms: Timestamp) -> Self {
        let len = data.len().min(Self::MAX_LEN);
        let mut bytes = [0u8; 8];
        bytes[..len].copy_from_slice(&data[..len]);

        Self {
            timestamp_ms,
            channel: 0,
            id,
            len: len as u8,
            data: bytes,
        }
    }

    /// Create a frame with an explicit declared length over a full byte buffer
    ///
    /// Mirrors what a bus driver hands over: a fixed 8-byte buffer plus a
    /// data length code. The length is clamped to 8.
    pub fn with_dlc(id: u32, dlc: u8, data: [u8; 8], timestamp_ms: Timestamp) -> Self {
        Self {
            timestamp_ms,
            channel: 0,
            id,
            len: dlc.min(Self::MAX_LEN as u8),
            data,
        }
    }

    /// Builder method: set the bus channel
    pub fn on_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    /// Declared data length (0-8)
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// True if the frame declares no data bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The declared data bytes
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    /// True if the identifier needs the 29-bit extended format
    pub fn is_extended(&self) -> bool {
        self.id > STANDARD_ID_MAX
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_extended() {
            write!(f, "{:08X}#", self.id)?;
        } else {
            write!(f, "{:03X}#", self.id)?;
        }
        for byte in self.data() {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// Errors that can occur while building or feeding the signal registry
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Invalid signal definition: {0}")]
    InvalidSignalDefinition(String),

    #[error("Invalid publish policy: {0}")]
    InvalidPolicy(String),

    #[error("Failed to parse descriptor table: {0}")]
    TableParseError(String),

    #[error("Failed to parse DBC file: {0}")]
    DbcParseError(String),

    #[error("Unsupported signal: {0}")]
    UnsupportedSignal(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A value the publish policy judged worth forwarding
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    /// Descriptor of the signal that produced the value
    pub descriptor: Arc<SignalDescriptor>,
    /// Physical value after scaling
    pub value: f64,
    /// Capture time of the frame the value was decoded from
    pub timestamp_ms: Timestamp,
}

impl Emission {
    /// Signal name (diagnostics)
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Destination topic for the transport
    pub fn destination(&self) -> &str {
        &self.descriptor.topic
    }

    /// Engineering unit
    pub fn unit(&self) -> &str {
        &self.descriptor.unit
    }

    /// Number of decimals used when rendering the value
    ///
    /// Percentages and counters are integral, voltages get two decimals,
    /// currents one. Everything else defaults to two.
    pub fn precision(&self) -> usize {
        let unit = self.unit();
        if unit.contains('%') || unit.contains("count") {
            0
        } else if unit.contains('V') {
            2
        } else if unit.contains('A') {
            1
        } else {
            2
        }
    }

    /// Value rendered with the unit-dependent precision
    pub fn payload(&self) -> String {
        format!("{:.*}", self.precision(), self.value)
    }

    /// Full transport topic under a base prefix
    pub fn topic(&self, base_topic: &str) -> String {
        let base = base_topic.trim_end_matches('/');
        if base.is_empty() {
            self.destination().to_string()
        } else {
            format!("{}/{}", base, self.destination())
        }
    }
}

impl fmt::Display for Emission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} {}", self.name(), self.payload(), self.unit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emission(unit: &'static str, value: f64) -> Emission {
        Emission {
            descriptor: Arc::new(SignalDescriptor::fixed(
                "Test", 0x100, 0, 16, 1.0, 0.0, unit, "test/value",
            )),
            value,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn test_frame_clamps_length() {
        let frame = Frame::new(0x123, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10], 5);
        assert_eq!(frame.len(), 8);
        assert_eq!(frame.data(), &[1, 2, 3, 4, 5, 6, 7, 8]);

        let frame = Frame::with_dlc(0x123, 12, [0xFF; 8], 5);
        assert_eq!(frame.len(), 8);
    }

    #[test]
    fn test_frame_short_payload() {
        let frame = Frame::new(0x42F, &[0xAA, 0xBB], 0).on_channel(1);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.channel, 1);
        assert!(!frame.is_extended());
        assert_eq!(frame.to_string(), "42F#AABB");
    }

    #[test]
    fn test_frame_extended_display() {
        let frame = Frame::new(0x18DAF110, &[], 0);
        assert!(frame.is_extended());
        assert!(frame.is_empty());
        assert_eq!(frame.to_string(), "18DAF110#");
    }

    #[test]
    fn test_emission_precision() {
        assert_eq!(emission("%", 80.4).payload(), "80");
        assert_eq!(emission("count", 12.0).payload(), "12");
        assert_eq!(emission("V", 398.123).payload(), "398.12");
        assert_eq!(emission("A", -12.34).payload(), "-12.3");
        assert_eq!(emission("km/h", 50.0).payload(), "50.00");
    }

    #[test]
    fn test_emission_topic() {
        let e = emission("V", 1.0);
        assert_eq!(e.topic("vehicle/zoe"), "vehicle/zoe/test/value");
        assert_eq!(e.topic("vehicle/zoe/"), "vehicle/zoe/test/value");
        assert_eq!(e.topic(""), "test/value");
    }
}
