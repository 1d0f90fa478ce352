//! Automation coordinator
//!
//! Fuses the readiness of every feed into one `working` gate and turns a
//! machine pause into a corrective B-axis move. All methods are synchronous
//! and expected to be called from a single loop; the caller performs the
//! I/O for whatever they return.

use crate::power::{LinearCompensation, PowerCompensation, PowerRange};
use chrono::Utc;
use focuskit_core::{
    AppEvent, Axes, AutomationError, AutomationEvent, EventBus, FocusMeasurement, MachineState,
    MachineTelemetry,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Message shown while nothing has happened yet
pub const IDLE_MESSAGE: &str = "Waiting for pause";

/// Startup settings of the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Arm automation at startup
    pub enabled: bool,
    /// Send the position correction on a pause edge
    pub autosend_position: bool,
    /// Send compensated laser power on the power timer
    pub autosend_power: bool,
    /// Lower power bound, fraction of full scale
    pub power_min: f32,
    /// Upper power bound, fraction of full scale
    pub power_max: f32,
    /// Period of the power timer in milliseconds
    pub power_period_ms: u64,
    /// Default compensation strategy
    pub compensation: LinearCompensation,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            autosend_position: true,
            autosend_power: false,
            power_min: 0.0,
            power_max: 1.0,
            power_period_ms: 1000,
            compensation: LinearCompensation::default(),
        }
    }
}

impl AutomationConfig {
    /// Power bounds as a validated range
    pub fn power_range(&self) -> Result<PowerRange, AutomationError> {
        PowerRange::new(self.power_min, self.power_max)
    }
}

/// Observable state of the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationState {
    pub enabled: bool,
    pub working: bool,
    pub last_offset: f32,
    pub last_offset_valid: bool,
    pub machine_link_up: bool,
    pub telemetry_link_up: bool,
    pub message: String,
    pub autosend_position: bool,
    pub autosend_power: bool,
    pub power_range: PowerRange,
    pub last_sent_power: Option<f32>,
}

/// Absolute B-axis move computed on a pause edge
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    /// Command line for the machine link
    pub command: String,
    /// Target B coordinate
    pub target_b: f32,
}

impl Correction {
    /// `target_b = b - offset`
    pub fn for_pause(b: f32, offset: f32) -> Self {
        let target_b = b - offset;
        Self {
            command: format!("G90 G0 B{:.3}", target_b),
            target_b,
        }
    }
}

#[derive(Debug)]
pub struct AutomationCoordinator {
    state: AutomationState,
    axes: Axes,
    machine_state: MachineState,
    compensation: Box<dyn PowerCompensation>,
    bus: Arc<EventBus>,
}

impl AutomationCoordinator {
    pub fn new(
        config: &AutomationConfig,
        compensation: Box<dyn PowerCompensation>,
        bus: Arc<EventBus>,
    ) -> Result<Self, AutomationError> {
        let power_range = config.power_range()?;
        Ok(Self {
            state: AutomationState {
                enabled: config.enabled,
                working: false,
                last_offset: 0.0,
                last_offset_valid: false,
                machine_link_up: false,
                telemetry_link_up: false,
                message: IDLE_MESSAGE.to_string(),
                autosend_position: config.autosend_position,
                autosend_power: config.autosend_power,
                power_range,
                last_sent_power: None,
            },
            axes: Axes::default(),
            machine_state: MachineState::NotPlaying,
            compensation,
            bus,
        })
    }

    /// Coordinator using the config's linear compensation
    pub fn from_config(
        config: &AutomationConfig,
        bus: Arc<EventBus>,
    ) -> Result<Self, AutomationError> {
        Self::new(config, Box::new(config.compensation), bus)
    }

    // ---- readiness inputs ----

    /// A completed measurement from the extractor
    pub fn on_focus(&mut self, measurement: FocusMeasurement) {
        self.state.last_offset = measurement.offset;
        self.state.last_offset_valid = measurement.is_valid();
        self.update_working();
    }

    /// Machine command link went up or down
    pub fn on_machine_link(&mut self, up: bool) {
        self.state.machine_link_up = up;
        self.update_working();
    }

    /// Telemetry feed went live or silent
    pub fn on_telemetry_link(&mut self, up: bool) {
        self.state.telemetry_link_up = up;
        self.update_working();
    }

    /// Operator enable flag; repeated values are ignored
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.state.enabled == enabled {
            return;
        }
        self.state.enabled = enabled;
        tracing::info!(enabled, "Automation enable changed");
        self.emit(AutomationEvent::EnabledChanged { enabled });
        self.update_working();
    }

    // ---- telemetry ----

    /// Latest coordinates and run state
    ///
    /// Returns the correction to send when this report is a pause edge, the
    /// gate is open and position autosend is on.
    pub fn on_telemetry(&mut self, axes: Axes, state: MachineState) -> Option<Correction> {
        self.axes = axes;
        let previous = std::mem::replace(&mut self.machine_state, state);
        if previous == MachineState::Paused || state != MachineState::Paused {
            return None;
        }

        if !self.state.working {
            tracing::debug!("Pause ignored: automation not working");
            return None;
        }

        let correction = Correction::for_pause(axes.b, self.state.last_offset);
        tracing::info!(
            b = axes.b,
            offset = self.state.last_offset,
            target = correction.target_b,
            "Pause edge"
        );

        if !self.state.autosend_position {
            self.set_message(format!("{} (not sent)", correction.command));
            return None;
        }

        self.set_message(correction.command.clone());
        self.emit(AutomationEvent::CorrectionIssued {
            command: correction.command.clone(),
            target_b: correction.target_b,
            at: Utc::now(),
        });
        Some(correction)
    }

    // ---- power ----

    /// Power timer tick
    ///
    /// Returns the power to send while working with power autosend on.
    pub fn on_power_tick(&mut self) -> Option<f32> {
        if !self.state.working || !self.state.autosend_power {
            return None;
        }
        let power = self
            .state
            .power_range
            .clamp(self.compensation.compensate(self.state.last_offset));
        self.state.last_sent_power = Some(power);
        self.emit(AutomationEvent::PowerSent { power });
        Some(power)
    }

    /// Replace the power bounds; an invalid range keeps the previous one
    pub fn set_power_range(&mut self, min: f32, max: f32) -> Result<(), AutomationError> {
        let range = PowerRange::new(min, max)?;
        if range != self.state.power_range {
            self.state.power_range = range;
            self.emit(AutomationEvent::PowerRangeChanged { min, max });
        }
        Ok(())
    }

    pub fn set_compensation(&mut self, compensation: Box<dyn PowerCompensation>) {
        self.compensation = compensation;
    }

    pub fn set_autosend_position(&mut self, on: bool) {
        if self.state.autosend_position != on {
            self.state.autosend_position = on;
            self.emit(AutomationEvent::AutosendPositionChanged { on });
        }
    }

    pub fn set_autosend_power(&mut self, on: bool) {
        if self.state.autosend_power != on {
            self.state.autosend_power = on;
            self.emit(AutomationEvent::AutosendPowerChanged { on });
        }
    }

    // ---- accessors ----

    pub fn working(&self) -> bool {
        self.state.working
    }

    pub fn message(&self) -> &str {
        &self.state.message
    }

    pub fn last_sent_power(&self) -> Option<f32> {
        self.state.last_sent_power
    }

    pub fn state(&self) -> &AutomationState {
        &self.state
    }

    /// Machine view assembled from the telemetry inputs
    pub fn telemetry(&self) -> MachineTelemetry {
        MachineTelemetry {
            axes: self.axes,
            state: self.machine_state,
            connected: self.state.telemetry_link_up,
        }
    }

    // ---- helpers ----

    fn update_working(&mut self) {
        let s = &self.state;
        let working = s.enabled && s.last_offset_valid && s.machine_link_up && s.telemetry_link_up;
        if working == self.state.working {
            return;
        }
        self.state.working = working;
        tracing::info!(working, "Automation gate changed");
        self.emit(AutomationEvent::WorkingChanged { working });
    }

    fn set_message(&mut self, message: String) {
        if self.state.message == message {
            return;
        }
        self.state.message = message.clone();
        self.emit(AutomationEvent::MessageChanged { message });
    }

    fn emit(&self, event: AutomationEvent) {
        self.bus.notify(AppEvent::Automation(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use focuskit_core::{EventBusConfig, LockState};

    fn recording() -> (AutomationCoordinator, Arc<EventBus>) {
        let bus = Arc::new(EventBus::with_config(EventBusConfig::recording()));
        let coordinator =
            AutomationCoordinator::from_config(&AutomationConfig::default(), bus.clone())
                .expect("coordinator");
        (coordinator, bus)
    }

    fn make_ready(c: &mut AutomationCoordinator, offset: f32) {
        c.set_enabled(true);
        c.on_machine_link(true);
        c.on_telemetry_link(true);
        c.on_focus(FocusMeasurement::new(offset, LockState::Locked));
    }

    #[test]
    fn test_pause_edge_correction() {
        let (mut c, _bus) = recording();
        make_ready(&mut c, 0.8);
        assert!(c.working());

        assert!(c
            .on_telemetry(Axes::new(0.0, 0.0, 0.0, 120.0), MachineState::Playing)
            .is_none());
        let correction = c
            .on_telemetry(Axes::new(0.0, 0.0, 0.0, 120.0), MachineState::Paused)
            .expect("correction");
        assert!((correction.target_b - 119.2).abs() < 1e-4);
        assert_eq!(correction.command, "G90 G0 B119.200");
        assert_eq!(c.message(), "G90 G0 B119.200");

        // Still paused: no second correction
        assert!(c
            .on_telemetry(Axes::new(0.0, 0.0, 0.0, 120.0), MachineState::Paused)
            .is_none());
    }

    #[test]
    fn test_no_correction_when_not_working() {
        let (mut c, _bus) = recording();
        c.on_machine_link(true);
        c.on_telemetry_link(true);
        c.on_focus(FocusMeasurement::new(0.8, LockState::Locked));
        assert!(!c.working());

        c.on_telemetry(Axes::default(), MachineState::Playing);
        assert!(c
            .on_telemetry(Axes::new(0.0, 0.0, 0.0, 120.0), MachineState::Paused)
            .is_none());
        assert_eq!(c.message(), IDLE_MESSAGE);
    }

    #[test]
    fn test_autosend_position_off_reports_only() {
        let (mut c, _bus) = recording();
        make_ready(&mut c, 0.5);
        c.set_autosend_position(false);
        assert!(c
            .on_telemetry(Axes::new(0.0, 0.0, 0.0, 10.0), MachineState::Paused)
            .is_none());
        assert_eq!(c.message(), "G90 G0 B9.500 (not sent)");
    }

    #[test]
    fn test_disable_twice_is_silent() {
        let (mut c, bus) = recording();
        c.set_enabled(false);
        c.set_enabled(false);
        assert!(bus.history(None).is_empty());

        make_ready(&mut c, 0.0);
        bus.clear_history();
        c.set_enabled(false);
        assert_eq!(bus.history(None).len(), 2);
        c.set_enabled(false);
        assert_eq!(bus.history(None).len(), 2);
    }

    #[test]
    fn test_power_tick() {
        let (mut c, _bus) = recording();
        assert!(c.on_power_tick().is_none());

        make_ready(&mut c, 2.0);
        assert!(c.on_power_tick().is_none());

        c.set_autosend_power(true);
        c.set_power_range(0.2, 0.6).expect("range");
        assert_eq!(c.on_power_tick(), Some(0.6));
        assert_eq!(c.last_sent_power(), Some(0.6));

        c.on_focus(FocusMeasurement::new(0.0, LockState::Hold));
        assert_eq!(c.on_power_tick(), Some(0.5));

        c.on_focus(FocusMeasurement::new(0.0, LockState::Unlocked));
        assert!(c.on_power_tick().is_none());
        assert_eq!(c.last_sent_power(), Some(0.5));
    }

    #[test]
    fn test_invalid_power_range_keeps_previous() {
        let (mut c, _bus) = recording();
        c.set_power_range(0.1, 0.9).expect("range");
        assert!(c.set_power_range(0.9, 0.1).is_err());
        assert_eq!(c.state().power_range, PowerRange::new(0.1, 0.9).expect("range"));
    }

    #[test]
    fn test_setting_changes_notify_once() {
        let (mut c, bus) = recording();
        c.set_autosend_position(false);
        c.set_autosend_power(true);
        c.set_power_range(0.2, 0.7).expect("range");

        let events: Vec<AutomationEvent> = bus
            .history(None)
            .into_iter()
            .filter_map(|event| match event {
                AppEvent::Automation(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], AutomationEvent::AutosendPositionChanged { on: false }));
        assert!(matches!(events[1], AutomationEvent::AutosendPowerChanged { on: true }));
        assert!(matches!(
            events[2],
            AutomationEvent::PowerRangeChanged { min, max } if min == 0.2 && max == 0.7
        ));

        bus.clear_history();
        c.set_autosend_position(false);
        c.set_autosend_power(true);
        c.set_power_range(0.2, 0.7).expect("range");
        assert!(c.set_power_range(0.8, 0.3).is_err());
        assert!(bus.history(None).is_empty());
    }

    #[test]
    fn test_unknown_state_is_not_a_pause() {
        let (mut c, _bus) = recording();
        make_ready(&mut c, 0.4);

        assert!(c
            .on_telemetry(Axes::new(0.0, 0.0, 0.0, 50.0), MachineState::Unknown(3))
            .is_none());
        assert_eq!(c.telemetry().state, MachineState::Unknown(3));
        assert_eq!(c.message(), IDLE_MESSAGE);

        let correction = c
            .on_telemetry(Axes::new(0.0, 0.0, 0.0, 50.0), MachineState::Paused)
            .expect("correction");
        assert_eq!(correction.command, "G90 G0 B49.600");
    }
}
