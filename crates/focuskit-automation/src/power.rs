//! Laser power compensation
//!
//! Power is a fraction of full scale. A [`PowerCompensation`] maps the
//! current focus offset to a requested power; the coordinator clamps the
//! result into the operator's [`PowerRange`].

use focuskit_core::AutomationError;
use serde::{Deserialize, Serialize};

/// Strategy mapping a focus offset to a laser power
pub trait PowerCompensation: Send + std::fmt::Debug {
    /// Requested power for `offset` mm of focus error, before clamping
    fn compensate(&self, offset: f32) -> f32;
}

/// `power = base + gain * offset`
///
/// A beam that is further out of focus spreads over a larger spot, so the
/// default raises power with the offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearCompensation {
    /// Power at zero offset
    pub base: f32,
    /// Power change per millimetre of offset
    pub gain: f32,
}

impl Default for LinearCompensation {
    fn default() -> Self {
        Self {
            base: 0.5,
            gain: 0.1,
        }
    }
}

impl PowerCompensation for LinearCompensation {
    fn compensate(&self, offset: f32) -> f32 {
        self.base + self.gain * offset
    }
}

/// Inclusive bounds on the power sent to the laser
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerRange {
    min: f32,
    max: f32,
}

impl PowerRange {
    /// Bounds must satisfy `0 <= min <= max <= 1`
    pub fn new(min: f32, max: f32) -> Result<Self, AutomationError> {
        if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) || min > max {
            return Err(AutomationError::InvalidPowerRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Clamp into the range; NaN maps to the lower bound
    pub fn clamp(&self, power: f32) -> f32 {
        if power.is_nan() {
            self.min
        } else {
            power.clamp(self.min, self.max)
        }
    }
}

impl Default for PowerRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_default() {
        let linear = LinearCompensation::default();
        assert_eq!(linear.compensate(0.0), 0.5);
        assert!((linear.compensate(2.0) - 0.7).abs() < 1e-6);
        assert!((linear.compensate(-1.0) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_range_validation() {
        assert!(PowerRange::new(0.2, 0.8).is_ok());
        assert!(PowerRange::new(0.5, 0.5).is_ok());
        assert_eq!(
            PowerRange::new(0.8, 0.2),
            Err(AutomationError::InvalidPowerRange { min: 0.8, max: 0.2 })
        );
        assert!(PowerRange::new(-0.1, 0.5).is_err());
        assert!(PowerRange::new(0.1, 1.5).is_err());
        assert!(PowerRange::new(f32::NAN, 0.5).is_err());
    }

    #[test]
    fn test_clamp() {
        let range = PowerRange::new(0.2, 0.8).expect("range");
        assert_eq!(range.clamp(0.1), 0.2);
        assert_eq!(range.clamp(0.5), 0.5);
        assert_eq!(range.clamp(0.9), 0.8);
        assert_eq!(range.clamp(f32::NAN), 0.2);
    }
}
