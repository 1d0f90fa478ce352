//! Detection parameters of the focus signal extractor

use crate::hsv::{ByteRange, Hsv, HsvBand};
use focuskit_core::VisionError;
use serde::{Deserialize, Serialize};

/// Colour windows, integration window, threshold and rotation
///
/// Changes take effect on the next processed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// Hue window at the bottom of the hue circle
    pub hue_low: ByteRange,
    /// Hue window at the top of the hue circle
    pub hue_high: ByteRange,
    /// Saturation window shared by both bands
    pub saturation: ByteRange,
    /// Value window shared by both bands
    pub value: ByteRange,
    /// Left edge of the integrated columns, fraction of width
    pub integrate_from: f32,
    /// Right edge of the integrated columns, fraction of width
    pub integrate_to: f32,
    /// Fraction of a fully saturated row a row sum must exceed
    pub threshold: f32,
    /// Static rotation applied before processing, degrees
    pub rotation: f32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            hue_low: ByteRange::new(0, 10),
            hue_high: ByteRange::new(160, Hsv::HUE_MAX),
            saturation: ByteRange::new(10, 255),
            value: ByteRange::new(10, 255),
            integrate_from: 0.2,
            integrate_to: 0.8,
            threshold: 0.6,
            rotation: 0.0,
        }
    }
}

impl DetectionParams {
    /// Clamp hue bounds into the 8-bit hue range
    pub fn clamped(mut self) -> Self {
        for range in [&mut self.hue_low, &mut self.hue_high] {
            range.from = range.from.min(Hsv::HUE_MAX);
            range.to = range.to.min(Hsv::HUE_MAX);
        }
        self
    }

    /// Check the parameters for consistency
    pub fn validate(&self) -> Result<(), VisionError> {
        for (name, range) in [
            ("hue_low", self.hue_low),
            ("hue_high", self.hue_high),
            ("saturation", self.saturation),
            ("value", self.value),
        ] {
            if !range.is_ordered() {
                return Err(invalid(
                    name,
                    format!("from {} is above to {}", range.from, range.to),
                ));
            }
        }

        let window = 0.0..=1.0;
        if !window.contains(&self.integrate_from) || !window.contains(&self.integrate_to) {
            return Err(invalid(
                "integrate",
                format!(
                    "window {}..{} is outside 0..1",
                    self.integrate_from, self.integrate_to
                ),
            ));
        }
        if self.integrate_from >= self.integrate_to {
            return Err(invalid(
                "integrate",
                format!(
                    "window {}..{} is empty",
                    self.integrate_from, self.integrate_to
                ),
            ));
        }

        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(invalid(
                "threshold",
                format!("{} is outside (0, 1]", self.threshold),
            ));
        }

        if !self.rotation.is_finite() {
            return Err(invalid("rotation", "must be finite".to_string()));
        }

        Ok(())
    }

    /// Band over the low hue window
    pub fn low_band(&self) -> HsvBand {
        HsvBand {
            hue: self.hue_low,
            saturation: self.saturation,
            value: self.value,
        }
    }

    /// Band over the high hue window
    pub fn high_band(&self) -> HsvBand {
        HsvBand {
            hue: self.hue_high,
            saturation: self.saturation,
            value: self.value,
        }
    }
}

fn invalid(param: &str, reason: String) -> VisionError {
    VisionError::InvalidParameter {
        param: param.to_string(),
        reason,
    }
}
