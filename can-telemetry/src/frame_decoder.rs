//! Frame Decoding Engine
//!
//! Extracts physical values from raw CAN frames based on signal descriptors.
//! Decoding is a pure function of the frame and the descriptor: no state, no
//! failure. Bits that lie past the frame's declared length (or past the 8-byte
//! buffer) read as zero.

use crate::signals::SignalDescriptor;
use crate::types::Frame;

/// Frame decoder - extracts signal values from CAN frames
pub struct FrameDecoder;

impl FrameDecoder {
    /// Decode a signal's physical value from a frame
    ///
    /// `physical = signed_raw * scale + offset`. A frame that declares no data
    /// bytes yields `offset` directly.
    pub fn decode(frame: &Frame, descriptor: &SignalDescriptor) -> f64 {
        if frame.is_empty() {
            return descriptor.offset;
        }

        let raw = Self::extract_little_endian(
            frame.data(),
            descriptor.start_bit as usize,
            descriptor.bit_length as usize,
        );
        let signed = Self::sign_extend(raw, descriptor.bit_length as usize);

        signed as f64 * descriptor.scale + descriptor.offset
    }

    /// Decode the signed raw value of a signal (before scaling)
    pub fn decode_raw(frame: &Frame, descriptor: &SignalDescriptor) -> i64 {
        let raw = Self::extract_little_endian(
            frame.data(),
            descriptor.start_bit as usize,
            descriptor.bit_length as usize,
        );
        Self::sign_extend(raw, descriptor.bit_length as usize)
    }

    /// Extract a little-endian (Intel) bit field
    ///
    /// Bit `start_bit + i` is bit `(start_bit + i) % 8` of byte
    /// `(start_bit + i) / 8` and lands at bit `i` of the result. Bits beyond
    /// `data`, or beyond 64 result bits, are zero.
    pub fn extract_little_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
        let mut result: u64 = 0;

        for i in 0..length.min(64) {
            let bit_pos = start_bit + i;
            let byte_idx = bit_pos / 8;
            let bit_in_byte = bit_pos % 8;

            if byte_idx < data.len() && byte_idx < Frame::MAX_LEN {
                let bit_value = (data[byte_idx] >> bit_in_byte) & 0x01;
                result |= (bit_value as u64) << i;
            }
        }

        result
    }

    /// Sign-extend a value from N bits to 64 bits
    ///
    /// If the value's MSB is 1, fill the upper bits with 1s. A 64-bit field is
    /// already canonical and is reinterpreted as-is.
    pub fn sign_extend(value: u64, bit_length: usize) -> i64 {
        if bit_length == 0 {
            return 0;
        }
        if bit_length >= 64 {
            return value as i64;
        }

        let sign_bit = 1u64 << (bit_length - 1);
        if (value & sign_bit) != 0 {
            // Negative value - sign extend
            let mask = !0u64 << bit_length;
            (value | mask) as i64
        } else {
            // Positive value
            value as i64
        }
    }
}
