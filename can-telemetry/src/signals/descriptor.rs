//! Signal descriptors
//!
//! A descriptor is pure data: where a physical quantity lives inside a frame
//! and how to scale it. Descriptors carry no behavior beyond validation and
//! are shared (`Arc`) between the registry and every emission they produce.

use crate::types::{Result, TelemetryError};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::ops::Range;

/// Width of the working register bits are assembled into
pub const REGISTER_BITS: u16 = 64;

/// Immutable definition of one signal inside a frame
///
/// Bits are numbered little-endian across the data bytes: bit `n` is bit
/// `n % 8` of byte `n / 8`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDescriptor {
    /// Signal name (diagnostics)
    pub name: Cow<'static, str>,
    /// Identifier of the frame carrying the signal
    pub frame_id: u32,
    /// First bit of the field (least significant bit of the raw value)
    pub start_bit: u16,
    /// Field width in bits (1-64)
    pub bit_length: u16,
    /// Scale factor applied to the signed raw value
    pub scale: f64,
    /// Offset added after scaling
    pub offset: f64,
    /// Engineering unit (e.g., "%", "V", "km/h")
    #[serde(default)]
    pub unit: Cow<'static, str>,
    /// Destination topic, only meaningful to the transport
    pub topic: Cow<'static, str>,
}

impl SignalDescriptor {
    /// Build a descriptor from static data (compiled-in tables)
    #[allow(clippy::too_many_arguments)]
    pub const fn fixed(
        name: &'static str,
        frame_id: u32,
        start_bit: u16,
        bit_length: u16,
        scale: f64,
        offset: f64,
        unit: &'static str,
        topic: &'static str,
    ) -> Self {
        Self {
            name: Cow::Borrowed(name),
            frame_id,
            start_bit,
            bit_length,
            scale,
            offset,
            unit: Cow::Borrowed(unit),
            topic: Cow::Borrowed(topic),
        }
    }

    /// Check the construction-time invariants
    ///
    /// A width outside 1-64 cannot be decoded and is rejected. A field that
    /// runs past the 64-bit register is accepted: the bits beyond it read as
    /// zero.
    pub fn validate(&self) -> Result<()> {
        if self.bit_length == 0 || self.bit_length > REGISTER_BITS {
            return Err(TelemetryError::InvalidSignalDefinition(format!(
                "signal '{}' has bit length {} (expected 1-{})",
                self.name, self.bit_length, REGISTER_BITS
            )));
        }
        if !self.scale.is_finite() || !self.offset.is_finite() {
            return Err(TelemetryError::InvalidSignalDefinition(format!(
                "signal '{}' has non-finite scale/offset ({}, {})",
                self.name, self.scale, self.offset
            )));
        }
        Ok(())
    }

    /// True if part of the field lies beyond the 64-bit register
    pub fn exceeds_register(&self) -> bool {
        self.start_bit as u32 + self.bit_length as u32 > REGISTER_BITS as u32
    }

    /// Bit positions covered by the field
    pub fn bit_range(&self) -> Range<u32> {
        let start = self.start_bit as u32;
        start..start + self.bit_length as u32
    }

    /// Number of data bytes the frame must declare for every bit to be present
    pub fn required_len(&self) -> usize {
        (self.bit_range().end as usize).div_ceil(8)
    }

    /// True if both descriptors read at least one common bit of the same frame
    pub fn overlaps(&self, other: &SignalDescriptor) -> bool {
        if self.frame_id != other.frame_id {
            return false;
        }
        let a = self.bit_range();
        let b = other.bit_range();
        a.start < b.end && b.start < a.end
    }
}
