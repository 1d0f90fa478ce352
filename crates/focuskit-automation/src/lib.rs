//! # FocusKit Automation
//!
//! Closes the loop between the focus extractor, machine telemetry and the
//! command link. The [`AutomationCoordinator`] decides; the [`ControlLoop`]
//! feeds it and carries out what it returns.

pub mod coordinator;
pub mod power;
pub mod runtime;

pub use coordinator::{
    AutomationConfig, AutomationCoordinator, AutomationState, Correction, IDLE_MESSAGE,
};
pub use power::{LinearCompensation, PowerCompensation, PowerRange};
pub use runtime::{
    spawn_control_loop, ControlChannels, ControlHandle, ControlLoop, LoopConfig, StatusReport,
    UserCommand,
};
