//! # Pylon Bridge
//!
//! A Rust library that sits between a battery/solar monitor and the rest of
//! an installation. It decides which telemetry samples are worth publishing
//! and emulates a Pylontech-style RS485 BMS so an inverter/charger can query
//! the pack.
//!
//! ## Features
//!
//! - Publication gates with threshold, heartbeat, rate-limit, stability
//!   window and boolean debounce variants
//! - Rollover-safe arithmetic over a wrapping millisecond clock
//! - Bitflip rate tracking and validators for string telemetry
//! - Pylontech frame codec: checksum, LENID, command/response building and
//!   response validation
//! - Emulated battery responder and a polling client over `serialport`
//! - CAN frame presence watchdog
//!
//! ## Example
//!
//! ```no_run
//! use pylon_bridge::{Bus, Responder, SerialTransport, Snapshot, BatteryProfile};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = Bus::new(SerialTransport::new("/dev/ttyUSB0")?);
//!     let mut responder = Responder::new(2, BatteryProfile::default(), Snapshot::default());
//!     loop {
//!         responder.serve_once(&bus)?;
//!     }
//! }
//! ```

pub mod bitflip;
pub mod clock;
pub mod config;
pub mod constants;
pub mod decode;
pub mod error;
pub mod format;
pub mod gate;
pub mod protocol;
pub mod publish;
pub mod responder;
pub mod stability;
pub mod transport;
pub mod types;
pub mod validate;
pub mod watchdog;

pub use bitflip::BitflipTracker;
pub use clock::{elapsed, Clock, ManualClock, SystemClock};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result, ValidationError};
pub use gate::{
    BoolChannel, BoolGate, FloatChannel, FloatGate, Gate, IntChannel, IntGate,
    RateLimitedFloatGate, StableFloatChannel, StableFloatGate,
};
pub use protocol::Frame;
pub use publish::{PacedPublisher, Pacing, PublishSink};
pub use responder::{Responder, TelemetrySource};
pub use stability::StabilityWindow;
pub use transport::{BmsClient, Bus, MemoryTransport, SerialTransport, Transport};
pub use types::*;
pub use watchdog::FrameWatchdog;
