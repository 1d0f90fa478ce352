//! Machine telemetry over UDP
//!
//! - [`record`]: the 28-byte status datagram and its layout revisions
//! - [`liveness`]: connected flag with a rolling timeout
//! - [`peripheral`]: laser power and exhaust tokens
//! - [`receiver`]: the socket loop tying them together

pub mod liveness;
pub mod peripheral;
pub mod receiver;
pub mod record;

pub use liveness::{LivenessMonitor, DEFAULT_LIVENESS_TIMEOUT};
pub use peripheral::{ExhaustPolarity, PeripheralCommand, LASER_POWER_FULL_SCALE};
pub use receiver::{
    publish_update, spawn_receiver, PeripheralSender, TelemetryReceiver, TelemetryTracker,
    TelemetryUpdate,
};
pub use record::{TelemetryLayout, TelemetryRecord, RECORD_SIZE};
