//! Collaborator interfaces
//!
//! The core never touches hardware or the network. Frames come in through a
//! [`FrameSource`], accepted values leave through a [`TransportSink`], and time
//! comes from a [`Clock`]. Implementations live with the surrounding system.

use crate::types::{Emission, Frame, Result, Timestamp};
use std::cell::Cell;
use std::collections::VecDeque;
use std::time::Instant;

/// Non-blocking supplier of received frames
pub trait FrameSource {
    /// Return the next pending frame, or `None` if nothing is queued
    fn try_receive(&mut self) -> Option<Frame>;
}

/// Destination for accepted values
///
/// Delivery failures are reported to the caller but never roll back the
/// publish policy's bookkeeping.
pub trait TransportSink {
    fn emit(&mut self, emission: &Emission) -> Result<()>;
}

/// Monotonic millisecond time source
pub trait Clock {
    fn now_ms(&self) -> Timestamp;
}

impl FrameSource for VecDeque<Frame> {
    fn try_receive(&mut self) -> Option<Frame> {
        self.pop_front()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn try_receive(&mut self) -> Option<Frame> {
        (**self).try_receive()
    }
}

/// Collects emissions in memory
impl TransportSink for Vec<Emission> {
    fn emit(&mut self, emission: &Emission) -> Result<()> {
        self.push(emission.clone());
        Ok(())
    }
}

impl<T: TransportSink + ?Sized> TransportSink for &mut T {
    fn emit(&mut self, emission: &Emission) -> Result<()> {
        (**self).emit(emission)
    }
}

/// Milliseconds since the clock was created
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> Timestamp {
        self.origin.elapsed().as_millis() as Timestamp
    }
}

/// Hand-driven clock for tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Timestamp>,
}

impl ManualClock {
    pub fn new(start_ms: Timestamp) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    /// Move time forward; the clock never goes backwards
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }

    /// Jump to an absolute time, ignored if it lies in the past
    pub fn set(&self, ms: Timestamp) {
        if ms > self.now.get() {
            self.now.set(ms);
        }
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Timestamp {
        self.now.get()
    }
}
