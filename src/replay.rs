//! Image-sequence frame producer
//!
//! Stands in for the camera thread: still images from a directory are
//! decoded and published into a [`FrameHub`] at a fixed rate, looping.

use focuskit_core::VisionError;
use focuskit_vision::FrameHub;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

#[derive(Debug, Clone)]
pub struct ImageReplay {
    frames: Vec<PathBuf>,
    period: Duration,
}

impl ImageReplay {
    /// Collect the images in `dir`, sorted by file name
    pub fn from_dir(dir: &Path, fps: f32) -> Result<Self, VisionError> {
        if !(fps > 0.0 && fps.is_finite()) {
            return Err(VisionError::InvalidParameter {
                param: "fps".to_string(),
                reason: format!("{} is not a positive rate", fps),
            });
        }

        let entries = std::fs::read_dir(dir).map_err(|e| VisionError::FrameSource {
            reason: format!("{}: {}", dir.display(), e),
        })?;
        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(VisionError::FrameSource {
                reason: format!("no images in {}", dir.display()),
            });
        }

        Ok(Self {
            frames,
            period: Duration::from_secs_f64(1.0 / f64::from(fps)),
        })
    }

    pub fn frames(&self) -> &[PathBuf] {
        &self.frames
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Publish frames until the task is aborted
    ///
    /// Unreadable files are logged and skipped.
    pub async fn run(self, hub: FrameHub) {
        tracing::info!(
            frames = self.frames.len(),
            period_ms = self.period.as_millis() as u64,
            "Replay started"
        );
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        for path in self.frames.iter().cycle() {
            ticker.tick().await;

            let file = path.clone();
            let decoded = tokio::task::spawn_blocking(move || image::open(&file)).await;
            let image = match decoded {
                Ok(Ok(image)) => image.to_rgb8(),
                Ok(Err(e)) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
                Err(e) => {
                    tracing::error!("Decoder task failed: {}", e);
                    continue;
                }
            };

            if let Err(e) = hub.publish(image) {
                tracing::warn!("Frame {} rejected: {}", path.display(), e);
            }
        }
    }

    pub fn spawn(self, hub: FrameHub) -> JoinHandle<()> {
        tokio::spawn(self.run(hub))
    }
}

fn is_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}
