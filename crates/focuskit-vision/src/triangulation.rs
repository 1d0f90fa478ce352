//! Beam-shift to focus-offset triangulation

use serde::{Deserialize, Serialize};

/// Camera and laser-source geometry used to convert a beam shift on the
/// sensor into an axial focus offset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpticalGeometry {
    /// Sensor resolution in pixels per millimetre
    pub pixels_per_mm: f32,
    /// Object distance of the lens, mm
    pub object_distance: f32,
    /// Focal length of the lens, mm
    pub focal_length: f32,
    /// Height of the line source above the work plane, mm
    pub source_height: f32,
    /// Lateral offset between the line source and the camera, mm
    pub source_offset: f32,
}

impl Default for OpticalGeometry {
    fn default() -> Self {
        Self {
            pixels_per_mm: 348.432,
            object_distance: 124.0,
            focal_length: 3.6,
            source_height: 130.0,
            source_offset: 180.0,
        }
    }
}

impl OpticalGeometry {
    /// Focus offset in mm for a beam shift of `shift` profile rows
    ///
    /// `dz = lz * d * (s0 - f) / (lx * f * ppmm - lz * d)`. Returns `None`
    /// when the denominator vanishes.
    pub fn focus_offset(&self, shift: f32) -> Option<f32> {
        let denominator = self.source_offset * self.focal_length * self.pixels_per_mm
            - self.source_height * shift;
        if denominator.abs() < f32::EPSILON {
            return None;
        }
        let dz = self.source_height * shift * (self.object_distance - self.focal_length)
            / denominator;
        dz.is_finite().then_some(dz)
    }
}
