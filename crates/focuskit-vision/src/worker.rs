//! Extractor task
//!
//! Runs the extractor next to the control loop: waits for frames, computes
//! the profile on a blocking thread, updates the lock machine and hands the
//! finished [`FocusMeasurement`] to the loop. Observability events go to the
//! event bus.

use crate::extractor::{compute_profile, FocusSignalExtractor, FrameAnalysis};
use crate::frame::FrameSource;
use crate::lock::LockTransition;
use crate::params::DetectionParams;
use crate::triangulation::OpticalGeometry;
use focuskit_core::{AppEvent, EventBus, FocusEvent, FocusMeasurement, VisionError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Request to the extractor task
#[derive(Debug, Clone)]
pub enum VisionCommand {
    /// Replace detection parameters
    SetParams(DetectionParams),
    /// Replace the optical geometry
    SetGeometry(OpticalGeometry),
    /// Capture the next valid beam midpoint as zero
    Zero,
}

/// Control handle of a running extractor task
#[derive(Debug)]
pub struct ExtractorHandle {
    commands: mpsc::UnboundedSender<VisionCommand>,
    task: JoinHandle<()>,
}

impl ExtractorHandle {
    /// Validate and send new detection parameters
    pub fn set_params(&self, params: DetectionParams) -> Result<(), VisionError> {
        let params = params.clamped();
        params.validate()?;
        self.send(VisionCommand::SetParams(params))
    }

    /// Send a new optical geometry
    pub fn set_geometry(&self, geometry: OpticalGeometry) -> Result<(), VisionError> {
        self.send(VisionCommand::SetGeometry(geometry))
    }

    /// Request a re-zero on the next valid frame
    pub fn zero(&self) -> Result<(), VisionError> {
        self.send(VisionCommand::Zero)
    }

    /// Whether the task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task
    pub fn shutdown(self) {
        self.task.abort();
    }

    fn send(&self, command: VisionCommand) -> Result<(), VisionError> {
        self.commands
            .send(command)
            .map_err(|_| VisionError::FrameSource {
                reason: "extractor task has stopped".to_string(),
            })
    }
}

/// Spawn the extractor task on the current runtime
pub fn spawn_extractor<S>(
    extractor: FocusSignalExtractor,
    source: S,
    bus: Arc<EventBus>,
    measurements: mpsc::Sender<FocusMeasurement>,
) -> ExtractorHandle
where
    S: FrameSource + 'static,
{
    let (commands, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_extractor(extractor, source, rx, bus, measurements));
    ExtractorHandle { commands, task }
}

/// Extractor task body
///
/// Exits when the frame source ends, the command handle is dropped, or the
/// measurement receiver is gone.
pub async fn run_extractor<S>(
    mut extractor: FocusSignalExtractor,
    mut source: S,
    mut commands: mpsc::UnboundedReceiver<VisionCommand>,
    bus: Arc<EventBus>,
    measurements: mpsc::Sender<FocusMeasurement>,
) where
    S: FrameSource,
{
    tracing::info!("Focus extractor started");

    loop {
        let deadline = extractor.hold_deadline();
        let hold_expired = async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            ready = source.frame_ready() => {
                if !ready {
                    tracing::info!("Frame source closed");
                    break;
                }
                let Some(frame) = source.snapshot() else {
                    continue;
                };

                let params = extractor.params().clone();
                let profile = match tokio::task::spawn_blocking(move || {
                    compute_profile(&frame, &params)
                })
                .await
                {
                    Ok(profile) => profile,
                    Err(e) => {
                        tracing::error!("Frame processing failed: {}", e);
                        continue;
                    }
                };

                let analysis = extractor.analyze_profile(&profile, Instant::now());
                publish_analysis(&bus, &analysis);
                if measurements.send(analysis.measurement).await.is_err() {
                    break;
                }
            }
            _ = hold_expired => {
                if let Some(transition) = extractor.expire_hold(Instant::now()) {
                    publish_transition(&bus, transition);
                    if measurements.send(extractor.measurement()).await.is_err() {
                        break;
                    }
                }
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                apply_command(&mut extractor, command, &bus);
            }
        }
    }

    tracing::info!("Focus extractor stopped");
}

fn apply_command(extractor: &mut FocusSignalExtractor, command: VisionCommand, bus: &EventBus) {
    match command {
        VisionCommand::SetParams(params) => match extractor.set_params(params) {
            Ok(()) => bus.notify(AppEvent::Focus(FocusEvent::ParametersChanged)),
            Err(e) => tracing::warn!("Detection parameters rejected: {}", e),
        },
        VisionCommand::SetGeometry(geometry) => {
            extractor.set_geometry(geometry);
            bus.notify(AppEvent::Focus(FocusEvent::ParametersChanged));
        }
        VisionCommand::Zero => {
            extractor.request_zero();
            bus.notify(AppEvent::Focus(FocusEvent::ZeroRequested));
        }
    }
}

fn publish_analysis(bus: &EventBus, analysis: &FrameAnalysis) {
    bus.notify(AppEvent::Focus(FocusEvent::ProfileReady {
        profile: analysis.profile.clone(),
    }));

    if let Some(report) = analysis.report {
        bus.notify(AppEvent::Focus(FocusEvent::BeamDetected {
            upper: report.upper,
            lower: report.lower,
            intensity: report.intensity,
        }));
    }

    if let Some(midpoint) = analysis.zero_applied {
        bus.notify(AppEvent::Focus(FocusEvent::ZeroApplied { midpoint }));
    }

    if analysis.offset.is_some() {
        bus.notify(AppEvent::Focus(FocusEvent::MeasurementChanged {
            measurement: analysis.measurement,
        }));
    }

    if let Some(transition) = analysis.transition {
        publish_transition(bus, transition);
    }
}

fn publish_transition(bus: &EventBus, transition: LockTransition) {
    tracing::info!(from = %transition.from, to = %transition.to, "Focus lock changed");
    bus.notify(AppEvent::Focus(FocusEvent::LockStateChanged {
        from: transition.from,
        to: transition.to,
    }));
}
