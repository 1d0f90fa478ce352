//! Control loop
//!
//! The one task that owns the coordinator and the command streamer. Focus
//! measurements, telemetry updates, link inputs, operator commands and the
//! power timer all arrive here and are applied in order, so no state is
//! shared between tasks.

use crate::coordinator::{AutomationCoordinator, AutomationState};
use focuskit_communication::{
    spawn_connect, CommandStreamer, LinkId, LinkInput, PeripheralCommand, PeripheralSender,
    TelemetryUpdate,
};
use focuskit_core::{
    AppEvent, AutomationError, ConnectionError, DisconnectReason, ErrorEvent, EventBus,
    FocusMeasurement, LinkState, LockState, MachineTelemetry, SequenceState,
};
use focuskit_vision::ExtractorHandle;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};

const CHANNEL_CAPACITY: usize = 256;

/// Operator request to the control loop
#[derive(Debug)]
pub enum UserCommand {
    /// Open the machine link
    Connect,
    /// Close the machine link
    Disconnect,
    /// Load a program file
    Load(PathBuf),
    Play,
    Pause,
    Stop,
    /// Send one line outside the sequence
    Send(String),
    SetEnabled(bool),
    /// Re-zero the focus reference on the next valid frame
    Zero,
    SetAutosendPosition(bool),
    SetAutosendPower(bool),
    SetPowerRange { min: f32, max: f32 },
    /// Send a peripheral token directly
    Peripheral(PeripheralCommand),
    /// Reply with a status snapshot
    Status(oneshot::Sender<StatusReport>),
    Shutdown,
}

/// Snapshot of everything the loop owns
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub automation: AutomationState,
    pub telemetry: MachineTelemetry,
    pub focus: FocusMeasurement,
    pub link: LinkState,
    pub sequence: SequenceState,
    pub current_line: usize,
    pub total_lines: usize,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = &self.automation;
        writeln!(
            f,
            "automation: enabled={} working={} message=\"{}\"",
            a.enabled, a.working, a.message
        )?;
        writeln!(
            f,
            "focus: offset={:.4} lock={}",
            self.focus.offset, self.focus.lock_state
        )?;
        writeln!(
            f,
            "machine: {} {} telemetry={}",
            self.telemetry.state,
            self.telemetry.axes,
            if self.telemetry.connected { "up" } else { "down" }
        )?;
        writeln!(
            f,
            "link: {} sequence: {} line {}/{}",
            self.link, self.sequence, self.current_line, self.total_lines
        )?;
        write!(
            f,
            "power: range {:.3}..{:.3} last={} autosend position={} power={}",
            a.power_range.min(),
            a.power_range.max(),
            a.last_sent_power
                .map(|p| format!("{:.3}", p))
                .unwrap_or_else(|| "-".to_string()),
            a.autosend_position,
            a.autosend_power
        )
    }
}

/// Link and timer settings of the loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Machine controller address, `host:port`
    pub link_address: String,
    pub connect_timeout: Duration,
    /// Power timer period; zero disables the timer
    pub power_period: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            link_address: "10.0.1.1:5555".to_string(),
            connect_timeout: Duration::from_millis(2000),
            power_period: Duration::from_millis(1000),
        }
    }
}

/// Senders for the producer tasks feeding the loop
#[derive(Debug, Clone)]
pub struct ControlChannels {
    /// Completed focus measurements
    pub focus: mpsc::Sender<FocusMeasurement>,
    /// Telemetry connectivity edges and records
    pub telemetry: mpsc::Sender<TelemetryUpdate>,
}

/// Operator side of a running loop
#[derive(Debug, Clone)]
pub struct ControlHandle {
    commands: mpsc::Sender<UserCommand>,
}

impl ControlHandle {
    pub async fn send(&self, command: UserCommand) -> Result<(), AutomationError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AutomationError::LoopStopped)
    }

    pub async fn status(&self) -> Result<StatusReport, AutomationError> {
        let (tx, rx) = oneshot::channel();
        self.send(UserCommand::Status(tx)).await?;
        rx.await.map_err(|_| AutomationError::LoopStopped)
    }

    pub async fn shutdown(&self) -> Result<(), AutomationError> {
        self.send(UserCommand::Shutdown).await
    }

    /// Whether the loop has exited
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

pub struct ControlLoop {
    config: LoopConfig,
    coordinator: AutomationCoordinator,
    streamer: CommandStreamer,
    focus: FocusMeasurement,
    bus: Arc<EventBus>,
    peripheral: Option<PeripheralSender>,
    vision: Option<ExtractorHandle>,
    link_id: LinkId,
    connecting: Option<JoinHandle<()>>,
    link_tx: mpsc::Sender<LinkInput>,
    link_rx: mpsc::Receiver<LinkInput>,
    focus_rx: mpsc::Receiver<FocusMeasurement>,
    telemetry_rx: mpsc::Receiver<TelemetryUpdate>,
    commands: mpsc::Receiver<UserCommand>,
}

impl ControlLoop {
    pub fn new(
        config: LoopConfig,
        coordinator: AutomationCoordinator,
        bus: Arc<EventBus>,
    ) -> (Self, ControlHandle, ControlChannels) {
        let (focus, focus_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (telemetry, telemetry_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (link_tx, link_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (commands, commands_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let control = Self {
            config,
            coordinator,
            streamer: CommandStreamer::new(bus.clone()),
            focus: FocusMeasurement::new(0.0, LockState::Unlocked),
            bus,
            peripheral: None,
            vision: None,
            link_id: 0,
            connecting: None,
            link_tx,
            link_rx,
            focus_rx,
            telemetry_rx,
            commands: commands_rx,
        };
        (
            control,
            ControlHandle { commands },
            ControlChannels { focus, telemetry },
        )
    }

    /// Route power and peripheral tokens through `sender`
    pub fn with_peripheral(mut self, sender: PeripheralSender) -> Self {
        self.peripheral = Some(sender);
        self
    }

    /// Forward zero requests to a running extractor
    pub fn with_vision(mut self, handle: ExtractorHandle) -> Self {
        self.vision = Some(handle);
        self
    }

    pub fn streamer(&self) -> &CommandStreamer {
        &self.streamer
    }

    pub fn streamer_mut(&mut self) -> &mut CommandStreamer {
        &mut self.streamer
    }

    pub fn coordinator(&self) -> &AutomationCoordinator {
        &self.coordinator
    }

    /// Run until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        tracing::info!("Control loop started");
        let mut power_timer = self.power_timer();

        loop {
            let power_tick = async {
                match power_timer.as_mut() {
                    Some(timer) => {
                        timer.tick().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                Some(measurement) = self.focus_rx.recv() => self.on_focus(measurement),
                Some(update) = self.telemetry_rx.recv() => self.on_telemetry(update),
                Some(input) = self.link_rx.recv() => self.on_link_input(input),
                command = self.commands.recv() => match command {
                    Some(UserCommand::Shutdown) | None => break,
                    Some(command) => self.on_command(command).await,
                },
                _ = power_tick => self.on_power_tick().await,
            }
        }

        self.close();
        tracing::info!("Control loop stopped");
    }

    fn power_timer(&self) -> Option<Interval> {
        if self.config.power_period.is_zero() {
            return None;
        }
        let mut timer = interval(self.config.power_period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Some(timer)
    }

    fn close(&mut self) {
        if let Some(task) = self.connecting.take() {
            task.abort();
        }
        self.streamer.detach(DisconnectReason::UserRequested);
        if let Some(vision) = self.vision.take() {
            vision.shutdown();
        }
    }

    // ---- inputs ----

    fn on_focus(&mut self, measurement: FocusMeasurement) {
        self.focus = measurement;
        self.coordinator.on_focus(measurement);
    }

    fn on_telemetry(&mut self, update: TelemetryUpdate) {
        match update {
            TelemetryUpdate::Connection(connected) => {
                self.coordinator.on_telemetry_link(connected);
            }
            TelemetryUpdate::Record(record) => {
                if let Some(correction) = self.coordinator.on_telemetry(record.axes, record.state)
                {
                    if let Err(e) = self.streamer.send_command(correction.command) {
                        self.report("correction", &e);
                    }
                    self.sync_machine_link();
                }
            }
        }
    }

    fn on_link_input(&mut self, input: LinkInput) {
        if input.id() != self.link_id {
            tracing::debug!(id = input.id(), current = self.link_id, "Stale link input ignored");
            return;
        }

        match input {
            LinkInput::Connected { handle, .. } => {
                self.connecting = None;
                self.streamer.attach(Box::new(handle));
            }
            LinkInput::ConnectFailed { address, error, .. } => {
                self.connecting = None;
                self.streamer.connect_failed(&address, &error);
                self.report("connect", &error);
            }
            LinkInput::Data { bytes, .. } => self.streamer.handle_bytes(&bytes),
            LinkInput::Closed { reason, .. } => self.streamer.detach(reason),
        }
        self.sync_machine_link();
    }

    async fn on_command(&mut self, command: UserCommand) {
        tracing::debug!("Operator command: {:?}", command);
        match command {
            UserCommand::Connect => self.connect(),
            UserCommand::Disconnect => self.disconnect(),
            UserCommand::Load(path) => {
                if let Err(e) = self.streamer.load_file(&path) {
                    self.report("load", &e);
                }
            }
            UserCommand::Play => {
                if let Err(e) = self.streamer.play() {
                    self.report("play", &e);
                }
            }
            UserCommand::Pause => self.streamer.pause(),
            UserCommand::Stop => self.streamer.stop(),
            UserCommand::Send(text) => {
                if let Err(e) = self.streamer.send_command(text) {
                    self.report("send", &e);
                }
            }
            UserCommand::SetEnabled(enabled) => self.coordinator.set_enabled(enabled),
            UserCommand::Zero => match &self.vision {
                Some(vision) => {
                    if let Err(e) = vision.zero() {
                        self.report("zero", &e);
                    }
                }
                None => self.report("zero", &"no focus extractor attached"),
            },
            UserCommand::SetAutosendPosition(on) => self.coordinator.set_autosend_position(on),
            UserCommand::SetAutosendPower(on) => self.coordinator.set_autosend_power(on),
            UserCommand::SetPowerRange { min, max } => {
                if let Err(e) = self.coordinator.set_power_range(min, max) {
                    self.report("power-range", &e);
                }
            }
            UserCommand::Peripheral(command) => self.send_peripheral(command).await,
            UserCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            UserCommand::Shutdown => {}
        }
        self.sync_machine_link();
    }

    async fn on_power_tick(&mut self) {
        if let Some(power) = self.coordinator.on_power_tick() {
            self.send_peripheral(PeripheralCommand::LaserPower(power)).await;
        }
    }

    // ---- actions ----

    fn connect(&mut self) {
        let state = self.streamer.link_state();
        if state != LinkState::Disconnected {
            self.report("connect", &ConnectionError::AlreadyActive {
                state: state.to_string(),
            });
            return;
        }

        self.link_id += 1;
        self.streamer.set_connecting();
        self.connecting = Some(spawn_connect(
            self.link_id,
            self.config.link_address.clone(),
            self.config.connect_timeout,
            self.link_tx.clone(),
        ));
    }

    fn disconnect(&mut self) {
        // Anything still in flight from the old connection becomes stale
        self.link_id += 1;
        if let Some(task) = self.connecting.take() {
            task.abort();
        }
        self.streamer.detach(DisconnectReason::UserRequested);
    }

    async fn send_peripheral(&mut self, command: PeripheralCommand) {
        let result = match &self.peripheral {
            Some(sender) => sender.send(command).await,
            None => Err(ConnectionError::NotConnected),
        };
        if let Err(e) = result {
            self.report("peripheral", &e);
        }
    }

    fn sync_machine_link(&mut self) {
        self.coordinator
            .on_machine_link(self.streamer.link_state().is_up());
    }

    fn status(&self) -> StatusReport {
        StatusReport {
            automation: self.coordinator.state().clone(),
            telemetry: self.coordinator.telemetry(),
            focus: self.focus,
            link: self.streamer.link_state(),
            sequence: self.streamer.state(),
            current_line: self.streamer.current_line(),
            total_lines: self.streamer.sequence().len(),
        }
    }

    fn report(&self, operation: &str, error: &dyn fmt::Display) {
        tracing::warn!("{} rejected: {}", operation, error);
        self.bus.notify(AppEvent::Error(ErrorEvent::Diagnostic {
            source: "control".to_string(),
            message: format!("{}: {}", operation, error),
        }));
    }
}

/// Spawn the loop on the current runtime
pub fn spawn_control_loop(control: ControlLoop) -> JoinHandle<()> {
    tokio::spawn(control.run())
}
