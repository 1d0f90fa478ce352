//! # FocusKit Core
//!
//! Core types, errors, and the event bus for FocusKit.
//! Provides the data model shared by the focus extractor, the telemetry
//! receiver, the command streamer, and the automation coordinator.

pub mod data;
pub mod error;
pub mod event_bus;
pub mod types;

pub use data::{
    Axes, CommandLine, FocusMeasurement, LineStatus, LinkState, LockState, MachineState,
    MachineTelemetry, SequenceState,
};

pub use error::{
    AutomationError, ConnectionError, Error, Result, StreamError, TelemetryError, VisionError,
};

pub use event_bus::{
    AppEvent, AutomationEvent, DisconnectReason, ErrorEvent, EventBus, EventBusConfig,
    EventCategory, EventFilter, FocusEvent, LinkEvent, StreamEvent, SubscriptionId,
    TelemetryEvent,
};

pub use types::{thread_safe_rw, ThreadSafeRw};
