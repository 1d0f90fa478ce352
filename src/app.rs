//! Application wiring
//!
//! Builds every component from a [`Config`], connects them to the control
//! loop and spawns their tasks.

use crate::replay::ImageReplay;
use anyhow::Context;
use focuskit_automation::{
    spawn_control_loop, AutomationCoordinator, ControlHandle, ControlLoop, LoopConfig,
};
use focuskit_communication::{spawn_receiver, TelemetryReceiver};
use focuskit_core::{AppEvent, EventBus, EventCategory, EventFilter};
use focuskit_settings::Config;
use focuskit_vision::{spawn_extractor, FocusSignalExtractor, FrameHub};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Startup overrides from the command line
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Replay still images from this directory as the camera
    pub replay_dir: Option<PathBuf>,
    /// Replay rate in frames per second
    pub replay_fps: f32,
    /// Program loaded before the loop starts
    pub program: Option<PathBuf>,
    /// Arm automation regardless of the configured flag
    pub enable: bool,
}

/// A running application
pub struct App {
    handle: ControlHandle,
    bus: Arc<EventBus>,
    frames: FrameHub,
    control: JoinHandle<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl App {
    /// Build and spawn every component
    pub async fn start(config: &Config, options: StartOptions) -> anyhow::Result<Self> {
        config.validate()?;
        let bus = EventBus::shared();
        log_events(&bus);

        let mut automation = config.automation.clone();
        automation.enabled |= options.enable;
        let coordinator = AutomationCoordinator::from_config(&automation, bus.clone())?;

        let loop_config = LoopConfig {
            link_address: config.link.address.clone(),
            connect_timeout: config.link.connect_timeout(),
            power_period: std::time::Duration::from_millis(automation.power_period_ms),
        };
        let (mut control, handle, channels) =
            ControlLoop::new(loop_config, coordinator, bus.clone());

        let mut tasks = Vec::new();

        // Telemetry and peripheral channel share one socket
        let receiver = TelemetryReceiver::bind(
            &config.telemetry.listen,
            config.telemetry.layout,
            config.telemetry.liveness_timeout(),
        )
        .await?;
        let peripheral = receiver.peripheral(
            config.telemetry.peer_addr()?,
            config.telemetry.exhaust_polarity,
            bus.clone(),
        );
        tasks.push(spawn_receiver(receiver, bus.clone(), channels.telemetry.clone()));

        // Focus extractor fed from the frame hub
        let frames = FrameHub::new();
        let extractor = FocusSignalExtractor::new(
            config.vision.detection.clone().clamped(),
            config.vision.geometry,
            config.vision.hold_timeout(),
        );
        let vision = spawn_extractor(
            extractor,
            frames.subscribe(),
            bus.clone(),
            channels.focus.clone(),
        );

        if let Some(dir) = &options.replay_dir {
            let replay = ImageReplay::from_dir(dir, options.replay_fps)
                .with_context(|| format!("replay source {}", dir.display()))?;
            tasks.push(replay.spawn(frames.clone()));
        }

        if let Some(program) = &options.program {
            control
                .streamer_mut()
                .load_file(program)
                .with_context(|| format!("loading {}", program.display()))?;
        }

        let control = spawn_control_loop(control.with_peripheral(peripheral).with_vision(vision));
        tracing::info!("FocusKit started");

        Ok(Self {
            handle,
            bus,
            frames,
            control,
            tasks,
        })
    }

    pub fn handle(&self) -> &ControlHandle {
        &self.handle
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Frame hub for an external camera producer
    pub fn frames(&self) -> &FrameHub {
        &self.frames
    }

    /// Stop the loop and every producer task
    pub async fn shutdown(self) {
        if self.handle.shutdown().await.is_err() {
            tracing::debug!("Control loop already stopped");
        }
        if let Err(e) = self.control.await {
            tracing::error!("Control loop task failed: {}", e);
        }
        for task in self.tasks {
            task.abort();
        }
        tracing::info!("FocusKit stopped");
    }
}

/// Mirror operator-relevant events into the log
fn log_events(bus: &EventBus) {
    bus.subscribe(
        EventFilter::Categories(vec![
            EventCategory::Automation,
            EventCategory::Link,
            EventCategory::Error,
        ]),
        |event: AppEvent| match event {
            AppEvent::Error(_) => tracing::warn!("{}", event.description()),
            _ => tracing::info!("{}", event.description()),
        },
    );
}
