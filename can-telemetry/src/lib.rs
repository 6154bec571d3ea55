//! CAN Telemetry Core Library
//!
//! Decodes raw CAN frames into physical-unit telemetry values and decides,
//! per value, whether it is worth forwarding to the transport.
//!
//! # Architecture
//!
//! - Signal descriptors are immutable data: frame ID, bit position and width,
//!   linear scale/offset, unit and destination topic. They come from the
//!   built-in vehicle catalog, TOML tables or DBC files.
//! - The frame decoder is a pure function of a frame and a descriptor.
//! - Every registered signal owns a publish policy (minimum interval plus
//!   tolerance) that filters the decoded values.
//! - The dispatcher routes a frame to the signals registered on its ID and
//!   returns what the policies let through.
//!
//! The publish policy's "now" is the frame's capture timestamp. Frame sources
//! stamp frames from a [`io::Clock`] (a bus driver with [`io::MonotonicClock`],
//! replays and simulations with [`io::ManualClock`]), so the policy never
//! reads a clock of its own.
//!
//! The library does NOT:
//! - Talk to bus hardware (see [`io::FrameSource`])
//! - Deliver values (see [`io::TransportSink`])
//! - Retry failed deliveries
//!
//! Initialization order: build descriptor table, register all signals, then
//! start dispatching. Teardown is dropping the dispatcher.
//!
//! # Example Usage
//!
//! ```
//! use can_telemetry::{Dispatcher, Frame, Registry, SignalDescriptor};
//!
//! let mut registry = Registry::new();
//! registry
//!     .register(
//!         SignalDescriptor::fixed("Speed", 0x140, 0, 16, 0.01, 0.0, "km/h", "motion/speed"),
//!         10_000, // at most every 10 s
//!         1.0,    // and only if it moved by 1 km/h
//!     )
//!     .unwrap();
//!
//! let mut dispatcher = Dispatcher::new(registry);
//!
//! // 5000 * 0.01 = 50 km/h
//! let frame = Frame::new(0x140, &[0x88, 0x13], 0);
//! for emission in dispatcher.dispatch(&frame) {
//!     println!("{} -> {}", emission.destination(), emission.payload());
//! }
//! ```

// Public modules
pub mod config;
pub mod dispatcher;
pub mod frame_decoder;
pub mod io;
pub mod policy;
pub mod registry;
pub mod signals;
pub mod types;

// Re-export main types for convenience
pub use config::{GatewayConfig, PublishIntervals, PublishTier};
pub use dispatcher::{DispatchStats, Dispatcher, DrainSummary, SharedDispatcher};
pub use frame_decoder::FrameDecoder;
pub use io::{Clock, FrameSource, ManualClock, MonotonicClock, TransportSink};
pub use policy::{LastEmission, PublishPolicy};
pub use registry::{ManagedSignal, Registry, RegistryStats, SignalHandle};
pub use signals::{PublishInterval, SignalDefinition, SignalDescriptor};
pub use types::{Emission, Frame, Result, TelemetryError, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
