//! # FocusKit Communication
//!
//! The two machine-facing transports of FocusKit:
//! - UDP telemetry from the motion controller, plus fire-and-forget
//!   peripheral tokens (laser power, exhaust) to the peripheral controller
//! - A persistent TCP command link that streams a G-code sequence under a
//!   single in-flight acknowledgment rule

pub mod stream;
pub mod telemetry;

pub use stream::{
    connect, spawn_connect, CommandSequence, CommandStreamer, LineAssembler, LineSink,
    LinkHandle, LinkId, LinkInput, ACK_OK,
};
pub use telemetry::{
    publish_update, spawn_receiver, ExhaustPolarity, LivenessMonitor, PeripheralCommand,
    PeripheralSender, TelemetryLayout, TelemetryReceiver, TelemetryRecord, TelemetryTracker,
    TelemetryUpdate, DEFAULT_LIVENESS_TIMEOUT, LASER_POWER_FULL_SCALE, RECORD_SIZE,
};
