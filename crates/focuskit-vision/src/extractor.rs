//! Focus signal extractor
//!
//! Turns one camera frame into a focus offset estimate. The pipeline is:
//! rotate, convert to HSV, keep the value channel inside the two red hue
//! bands, integrate rows over the column window, find the over-threshold
//! span and triangulate its shift from the zero reference.

use crate::frame::Frame;
use crate::hsv::masked_value;
use crate::lock::{LockTracker, LockTransition};
use crate::params::DetectionParams;
use crate::profile::{BeamSpan, IntegrationProfile};
use crate::rotation::rotate;
use crate::triangulation::OpticalGeometry;
use focuskit_core::{FocusMeasurement, LockState, VisionError};
use std::borrow::Cow;
use std::time::Duration;
use tokio::time::Instant;

/// Beam bounds expressed as fractions of the frame height
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamReport {
    /// Last over-threshold index divided by the frame height
    pub upper: f32,
    /// First over-threshold index divided by the frame height
    pub lower: f32,
    /// Normalized intensity at the upper bound
    pub intensity: f32,
}

/// Everything one processed frame produced
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    /// Normalized profile, bottom row first
    pub profile: Vec<f32>,
    /// Beam span in profile indices
    pub beam: Option<BeamSpan>,
    /// Beam span as fractions of the frame height
    pub report: Option<BeamReport>,
    /// Offset computed from this frame, if it was valid
    pub offset: Option<f32>,
    /// Reference midpoint captured by this frame
    pub zero_applied: Option<f32>,
    /// Lock change caused by this frame
    pub transition: Option<LockTransition>,
    /// Measurement after this frame
    pub measurement: FocusMeasurement,
}

/// Masked row profile of one frame under `params`
///
/// Pure function of its inputs so it can run on a blocking thread.
pub fn compute_profile(frame: &Frame, params: &DetectionParams) -> IntegrationProfile {
    let image = if params.rotation == 0.0 {
        Cow::Borrowed(frame.image())
    } else {
        Cow::Owned(rotate(frame.image(), params.rotation))
    };
    let masked = masked_value(&image, &params.low_band(), &params.high_band());
    IntegrationProfile::integrate(
        &masked,
        params.integrate_from,
        params.integrate_to,
        params.threshold,
    )
}

/// Per-frame focus offset estimator with its lock machine
#[derive(Debug, Clone)]
pub struct FocusSignalExtractor {
    params: DetectionParams,
    geometry: OpticalGeometry,
    lock: LockTracker,
    offset: f32,
    zero_reference: f32,
    zero_pending: bool,
}

impl FocusSignalExtractor {
    /// Create an unlocked extractor
    pub fn new(params: DetectionParams, geometry: OpticalGeometry, hold_timeout: Duration) -> Self {
        Self {
            params: params.clamped(),
            geometry,
            lock: LockTracker::new(hold_timeout),
            offset: 0.0,
            zero_reference: 0.0,
            zero_pending: false,
        }
    }

    /// Process one frame
    pub fn process(&mut self, frame: &Frame, now: Instant) -> FrameAnalysis {
        let profile = compute_profile(frame, &self.params);
        self.analyze_profile(&profile, now)
    }

    /// Update offset and lock state from an already computed profile
    pub fn analyze_profile(&mut self, profile: &IntegrationProfile, now: Instant) -> FrameAnalysis {
        let normalized = profile.normalized();
        let beam = profile.beam();
        let height = profile.len().max(1) as f32;

        let mut zero_applied = None;
        let mut offset = None;
        let mut report = None;

        if let Some(span) = beam {
            report = Some(BeamReport {
                upper: span.last as f32 / height,
                lower: span.first as f32 / height,
                intensity: normalized.get(span.last).copied().unwrap_or(0.0),
            });

            let midpoint = span.midpoint();
            if self.zero_pending {
                self.zero_reference = midpoint;
                self.zero_pending = false;
                zero_applied = Some(midpoint);
                tracing::info!(midpoint, "Focus zero reference captured");
            }

            match self.geometry.focus_offset(midpoint - self.zero_reference) {
                Some(dz) => {
                    self.offset = dz;
                    offset = Some(dz);
                }
                None => {
                    tracing::warn!(midpoint, "Beam shift outside triangulation range");
                }
            }
        }

        let transition = self.lock.observe(offset.is_some(), now);

        FrameAnalysis {
            profile: normalized,
            beam,
            report,
            offset,
            zero_applied,
            transition,
            measurement: self.measurement(),
        }
    }

    /// Unlock if the hold timer has run out
    pub fn expire_hold(&mut self, now: Instant) -> Option<LockTransition> {
        self.lock.poll(now)
    }

    /// When the hold timer runs out, if armed
    pub fn hold_deadline(&self) -> Option<Instant> {
        self.lock.deadline()
    }

    /// Capture the beam midpoint of the next valid frame as zero
    pub fn request_zero(&mut self) {
        self.zero_pending = true;
    }

    /// Whether a re-zero is waiting for a valid frame
    pub fn zero_pending(&self) -> bool {
        self.zero_pending
    }

    /// Last computed offset and the current lock state
    pub fn measurement(&self) -> FocusMeasurement {
        FocusMeasurement::new(self.offset, self.lock.state())
    }

    /// Current lock state
    pub fn lock_state(&self) -> LockState {
        self.lock.state()
    }

    /// Current detection parameters
    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    /// Replace the detection parameters
    pub fn set_params(&mut self, params: DetectionParams) -> Result<(), VisionError> {
        let params = params.clamped();
        params.validate()?;
        self.params = params;
        Ok(())
    }

    /// Current optical geometry
    pub fn geometry(&self) -> &OpticalGeometry {
        &self.geometry
    }

    /// Replace the optical geometry
    pub fn set_geometry(&mut self, geometry: OpticalGeometry) {
        self.geometry = geometry;
    }
}

impl Default for FocusSignalExtractor {
    fn default() -> Self {
        Self::new(
            DetectionParams::default(),
            OpticalGeometry::default(),
            crate::lock::DEFAULT_HOLD_TIMEOUT,
        )
    }
}
