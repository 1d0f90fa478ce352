//! Data models shared between the controller components
//!
//! This module provides:
//! - Machine coordinates and run state as reported by telemetry
//! - Link connectivity for the command stream
//! - Focus measurements and the lock state of the extractor
//! - Command lines and playback state of the streamer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine coordinates of the four reported axes, in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Axes {
    /// X-axis position
    pub x: f32,
    /// Y-axis position
    pub y: f32,
    /// Z-axis position
    pub z: f32,
    /// B-axis position (focus axis on the reference machine)
    pub b: f32,
}

impl Axes {
    /// Create a coordinate set from its four components
    pub fn new(x: f32, y: f32, z: f32, b: f32) -> Self {
        Self { x, y, z, b }
    }
}

impl fmt::Display for Axes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X{:.3} Y{:.3} Z{:.3} B{:.3}",
            self.x, self.y, self.z, self.b
        )
    }
}

/// Run state of the machine program as reported by telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MachineState {
    /// No program is running
    #[default]
    NotPlaying,
    /// A program is running
    Playing,
    /// The running program is paused
    Paused,
    /// A code the protocol does not define
    Unknown(i32),
}

impl MachineState {
    /// Map a wire state code to a machine state
    ///
    /// Codes: `0` not playing, `1` playing, `2` paused. Anything else is
    /// kept as [`MachineState::Unknown`] and never reads as a pause.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::NotPlaying,
            1 => Self::Playing,
            2 => Self::Paused,
            other => Self::Unknown(other),
        }
    }

    /// Wire state code for this state
    pub fn code(&self) -> i32 {
        match self {
            Self::NotPlaying => 0,
            Self::Playing => 1,
            Self::Paused => 2,
            Self::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPlaying => write!(f, "NotPlaying"),
            Self::Playing => write!(f, "Playing"),
            Self::Paused => write!(f, "Paused"),
            Self::Unknown(code) => write!(f, "Unknown({})", code),
        }
    }
}

/// Latest telemetry snapshot of the machine
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MachineTelemetry {
    /// Last reported coordinates
    pub axes: Axes,
    /// Last reported run state
    pub state: MachineState,
    /// Whether datagrams are arriving within the liveness window
    pub connected: bool,
}

/// Tri-state connectivity of the command link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LinkState {
    /// No connection
    #[default]
    Disconnected,
    /// Connect attempt in progress
    Connecting,
    /// Connection established
    Connected,
}

impl LinkState {
    /// Whether the link can carry commands
    pub fn is_up(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Confidence state of the focus offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LockState {
    /// No recent valid measurement
    #[default]
    Unlocked,
    /// The current frame produced a valid measurement
    Locked,
    /// Recently valid; waiting for the hold timeout before unlocking
    Hold,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlocked => write!(f, "Unlocked"),
            Self::Locked => write!(f, "Locked"),
            Self::Hold => write!(f, "Hold"),
        }
    }
}

/// Focus offset estimate with its lock state
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FocusMeasurement {
    /// Estimated axial focus error in millimetres
    pub offset: f32,
    /// Lock state at the time of the measurement
    pub lock_state: LockState,
}

impl FocusMeasurement {
    /// Create a measurement
    pub fn new(offset: f32, lock_state: LockState) -> Self {
        Self { offset, lock_state }
    }

    /// The offset is meaningful unless the extractor is unlocked
    pub fn is_valid(&self) -> bool {
        self.lock_state != LockState::Unlocked
    }
}

/// Outcome of a single command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LineStatus {
    /// Not yet acknowledged
    #[default]
    Pending,
    /// Acknowledged with `ok`
    Ok,
    /// Acknowledged with anything other than `ok`
    Warning,
    /// A command sent outside the loaded sequence
    InternalCommand,
}

impl fmt::Display for LineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Ok => write!(f, "ok"),
            Self::Warning => write!(f, "warning"),
            Self::InternalCommand => write!(f, "internal"),
        }
    }
}

/// One line of a command sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    /// 1-based line number; 0 for commands outside the sequence
    pub line_number: usize,
    /// Command text without line terminator
    pub text: String,
    /// Acknowledgment outcome
    pub status: LineStatus,
    /// Raw response for anything other than `ok`
    pub response: String,
}

impl CommandLine {
    /// Create a pending line
    pub fn new(line_number: usize, text: impl Into<String>) -> Self {
        Self {
            line_number,
            text: text.into(),
            status: LineStatus::Pending,
            response: String::new(),
        }
    }

    /// Create a record for a command sent outside the sequence
    pub fn internal(text: impl Into<String>) -> Self {
        Self {
            line_number: 0,
            text: text.into(),
            status: LineStatus::InternalCommand,
            response: String::new(),
        }
    }
}

/// Playback state of the command sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SequenceState {
    /// Not playing; cursor at the start or end
    #[default]
    Stopped,
    /// Streaming lines
    Playing,
    /// Holding at the current line
    Paused,
    /// Playback interrupted by a link failure
    Error,
}

impl fmt::Display for SequenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Playing => write!(f, "Playing"),
            Self::Paused => write!(f, "Paused"),
            Self::Error => write!(f, "Error"),
        }
    }
}
