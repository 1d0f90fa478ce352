//! Event type definitions for the event bus.
//!
//! This module defines all change notifications organized by category.
//! Events are cloneable and serializable for logging/replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{
    Axes, CommandLine, FocusMeasurement, LinkState, LockState, MachineState, SequenceState,
};

/// Root event enum for all application events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppEvent {
    /// Focus extractor output
    Focus(FocusEvent),
    /// Machine telemetry and peripheral channel
    Telemetry(TelemetryEvent),
    /// Command link connectivity
    Link(LinkEvent),
    /// Command sequence playback
    Stream(StreamEvent),
    /// Automation coordinator state
    Automation(AutomationEvent),
    /// Error and diagnostic events
    Error(ErrorEvent),
}

impl AppEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            AppEvent::Focus(_) => EventCategory::Focus,
            AppEvent::Telemetry(_) => EventCategory::Telemetry,
            AppEvent::Link(_) => EventCategory::Link,
            AppEvent::Stream(_) => EventCategory::Stream,
            AppEvent::Automation(_) => EventCategory::Automation,
            AppEvent::Error(_) => EventCategory::Error,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            AppEvent::Focus(e) => e.description(),
            AppEvent::Telemetry(e) => e.description(),
            AppEvent::Link(e) => e.description(),
            AppEvent::Stream(e) => e.description(),
            AppEvent::Automation(e) => e.description(),
            AppEvent::Error(e) => e.description(),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Focus extractor events.
    Focus,
    /// Telemetry events.
    Telemetry,
    /// Command link events.
    Link,
    /// Sequence playback events.
    Stream,
    /// Automation coordinator events.
    Automation,
    /// Error and diagnostic events.
    Error,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Focus => write!(f, "Focus"),
            EventCategory::Telemetry => write!(f, "Telemetry"),
            EventCategory::Link => write!(f, "Link"),
            EventCategory::Stream => write!(f, "Stream"),
            EventCategory::Automation => write!(f, "Automation"),
            EventCategory::Error => write!(f, "Error"),
        }
    }
}

/// Focus extractor events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FocusEvent {
    /// A frame produced a new offset estimate.
    MeasurementChanged {
        /// The new measurement.
        measurement: FocusMeasurement,
    },
    /// Lock state changed.
    LockStateChanged {
        /// Previous state.
        from: LockState,
        /// New state.
        to: LockState,
    },
    /// Normalized intensity profile of the last frame, bottom row first.
    ProfileReady {
        /// Row sums divided by their maximum.
        profile: Vec<f32>,
    },
    /// Beam thickness bounds of the last frame.
    BeamDetected {
        /// Last over-threshold row as a fraction of frame height.
        upper: f32,
        /// First over-threshold row as a fraction of frame height.
        lower: f32,
        /// Normalized intensity at the upper bound.
        intensity: f32,
    },
    /// Re-zero of the reference midpoint was requested.
    ZeroRequested,
    /// Reference midpoint was captured.
    ZeroApplied {
        /// New reference midpoint, in profile rows.
        midpoint: f32,
    },
    /// Detection parameters were replaced.
    ParametersChanged,
}

impl FocusEvent {
    fn description(&self) -> String {
        match self {
            FocusEvent::MeasurementChanged { measurement } => format!(
                "Focus offset {:.4} ({})",
                measurement.offset, measurement.lock_state
            ),
            FocusEvent::LockStateChanged { from, to } => format!("Lock {} -> {}", from, to),
            FocusEvent::ProfileReady { profile } => {
                format!("Profile ready ({} rows)", profile.len())
            }
            FocusEvent::BeamDetected { upper, lower, .. } => {
                format!("Beam between {:.3} and {:.3}", lower, upper)
            }
            FocusEvent::ZeroRequested => "Zero requested".to_string(),
            FocusEvent::ZeroApplied { midpoint } => format!("Zero set at row {:.1}", midpoint),
            FocusEvent::ParametersChanged => "Detection parameters changed".to_string(),
        }
    }
}

/// Machine telemetry events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEvent {
    /// Telemetry liveness changed.
    ConnectionChanged {
        /// Whether datagrams are arriving.
        connected: bool,
    },
    /// Machine run state reported.
    StateChanged {
        /// Reported state.
        state: MachineState,
    },
    /// Machine coordinates reported.
    CoordinatesChanged {
        /// Reported coordinates.
        axes: Axes,
    },
    /// Program progress counters reported.
    ProgressChanged {
        /// Lines played by the machine.
        played: i64,
        /// Total lines in the machine program.
        total: i64,
    },
    /// A peripheral token was sent.
    PeripheralCommandSent {
        /// The token sent on the wire.
        token: String,
    },
}

impl TelemetryEvent {
    fn description(&self) -> String {
        match self {
            TelemetryEvent::ConnectionChanged { connected } => format!(
                "Telemetry {}",
                if *connected { "connected" } else { "lost" }
            ),
            TelemetryEvent::StateChanged { state } => format!("Machine {}", state),
            TelemetryEvent::CoordinatesChanged { axes } => format!("Machine at {}", axes),
            TelemetryEvent::ProgressChanged { played, total } => {
                format!("Progress {}/{}", played, total)
            }
            TelemetryEvent::PeripheralCommandSent { token } => format!("Sent {}", token),
        }
    }
}

/// Reason for disconnection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// User requested disconnect
    UserRequested,
    /// Remote side closed the connection
    RemoteClosed,
    /// Error occurred
    Error(String),
}

/// Command link events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LinkEvent {
    /// Link state changed.
    StateChanged {
        /// New link state.
        state: LinkState,
    },
    /// Connect attempt failed.
    ConnectFailed {
        /// Address that was attempted.
        address: String,
        /// Error message describing the failure.
        error: String,
    },
    /// Link went down.
    Disconnected {
        /// Reason for the disconnection.
        reason: DisconnectReason,
    },
}

impl LinkEvent {
    fn description(&self) -> String {
        match self {
            LinkEvent::StateChanged { state } => format!("Link {}", state),
            LinkEvent::ConnectFailed { address, error } => {
                format!("Connect to {} failed: {}", address, error)
            }
            LinkEvent::Disconnected { reason } => format!("Link down: {:?}", reason),
        }
    }
}

/// Sequence playback events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamEvent {
    /// A new sequence replaced the previous one.
    Loaded {
        /// Number of lines loaded.
        lines: usize,
    },
    /// Playback state changed.
    StateChanged {
        /// New playback state.
        state: SequenceState,
    },
    /// Cursor moved.
    CurrentLineChanged {
        /// 1-based line number.
        line_number: usize,
    },
    /// A sequence entry was replaced.
    LineChanged {
        /// Zero-based index of the entry.
        index: usize,
        /// The new entry.
        line: CommandLine,
    },
    /// All entries were reset to pending.
    AllLinesReset,
    /// A line was written to the link.
    LineSent {
        /// 1-based line number, 0 for commands outside the sequence.
        line_number: usize,
        /// Command text.
        text: String,
    },
    /// A command sent outside the sequence was acknowledged.
    InternalAcknowledged {
        /// The command record with its response.
        line: CommandLine,
    },
    /// A line arrived while nothing was awaiting acknowledgment.
    Informational {
        /// Raw line.
        text: String,
    },
    /// An operation was rejected.
    Rejected {
        /// Operation name.
        operation: String,
        /// Rejection reason.
        reason: String,
    },
}

impl StreamEvent {
    fn description(&self) -> String {
        match self {
            StreamEvent::Loaded { lines } => format!("Loaded {} lines", lines),
            StreamEvent::StateChanged { state } => format!("Playback {}", state),
            StreamEvent::CurrentLineChanged { line_number } => {
                format!("Current line {}", line_number)
            }
            StreamEvent::LineChanged { index, line } => {
                format!("Line {} is {}", index + 1, line.status)
            }
            StreamEvent::AllLinesReset => "All lines pending".to_string(),
            StreamEvent::LineSent { line_number, text } => {
                format!("Sent #{}: {}", line_number, text)
            }
            StreamEvent::InternalAcknowledged { line } => {
                format!("Internal '{}' acknowledged", line.text)
            }
            StreamEvent::Informational { text } => format!("Controller: {}", text),
            StreamEvent::Rejected { operation, reason } => {
                format!("{} rejected: {}", operation, reason)
            }
        }
    }
}

/// Automation coordinator events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AutomationEvent {
    /// Working gate changed.
    WorkingChanged {
        /// New gate value.
        working: bool,
    },
    /// Operator enable flag changed.
    EnabledChanged {
        /// New flag value.
        enabled: bool,
    },
    /// Status message changed.
    MessageChanged {
        /// New message.
        message: String,
    },
    /// A position correction was issued on a pause edge.
    CorrectionIssued {
        /// The command text.
        command: String,
        /// Target B coordinate.
        target_b: f32,
        /// When the correction was computed.
        at: DateTime<Utc>,
    },
    /// A laser power level was sent.
    PowerSent {
        /// Power as a fraction of full scale.
        power: f32,
    },
    /// Position correction autosend toggled.
    AutosendPositionChanged {
        /// New flag value.
        on: bool,
    },
    /// Power autosend toggled.
    AutosendPowerChanged {
        /// New flag value.
        on: bool,
    },
    /// Power bounds changed.
    PowerRangeChanged {
        /// Lower bound.
        min: f32,
        /// Upper bound.
        max: f32,
    },
}

impl AutomationEvent {
    fn description(&self) -> String {
        match self {
            AutomationEvent::WorkingChanged { working } => format!("Working: {}", working),
            AutomationEvent::EnabledChanged { enabled } => format!("Enabled: {}", enabled),
            AutomationEvent::MessageChanged { message } => message.clone(),
            AutomationEvent::CorrectionIssued { command, at, .. } => {
                format!("{} at {}", command, at.format("%H:%M:%S%.3f"))
            }
            AutomationEvent::PowerSent { power } => format!("Power {:.3}", power),
            AutomationEvent::AutosendPositionChanged { on } => {
                format!("Position autosend: {}", on)
            }
            AutomationEvent::AutosendPowerChanged { on } => format!("Power autosend: {}", on),
            AutomationEvent::PowerRangeChanged { min, max } => {
                format!("Power range {:.3}..{:.3}", min, max)
            }
        }
    }
}

/// Error and diagnostic events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ErrorEvent {
    /// Non-fatal diagnostic from a component.
    Diagnostic {
        /// Component name.
        source: String,
        /// Diagnostic text.
        message: String,
    },
}

impl ErrorEvent {
    fn description(&self) -> String {
        match self {
            ErrorEvent::Diagnostic { source, message } => format!("[{}] {}", source, message),
        }
    }
}
