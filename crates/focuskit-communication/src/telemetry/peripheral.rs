//! Peripheral command tokens
//!
//! The peripheral controller accepts short ASCII tokens over UDP:
//! `l(<0-4095>)` sets laser power, `t(<0|1>)` and `b(<0|1>)` switch the top
//! and bottom exhaust.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Full-scale value of the laser power token
pub const LASER_POWER_FULL_SCALE: f32 = 4095.0;

/// Electrical polarity of the exhaust switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustPolarity {
    /// `0` switches the exhaust on
    #[default]
    ActiveLow,
    /// `1` switches the exhaust on
    ActiveHigh,
}

impl ExhaustPolarity {
    fn level(&self, enabled: bool) -> u8 {
        match (self, enabled) {
            (ExhaustPolarity::ActiveLow, true) | (ExhaustPolarity::ActiveHigh, false) => 0,
            _ => 1,
        }
    }
}

/// One fire-and-forget command for the peripheral controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PeripheralCommand {
    /// Laser power as a fraction of full scale, clamped to `0.0..=1.0`
    LaserPower(f32),
    /// Top exhaust on or off
    TopExhaust(bool),
    /// Bottom exhaust on or off
    BottomExhaust(bool),
}

impl PeripheralCommand {
    /// Wire token for this command
    pub fn token(&self, polarity: ExhaustPolarity) -> String {
        match self {
            PeripheralCommand::LaserPower(power) => {
                let power = if power.is_nan() {
                    0.0
                } else {
                    power.clamp(0.0, 1.0)
                };
                format!("l({})", (power * LASER_POWER_FULL_SCALE) as u16)
            }
            PeripheralCommand::TopExhaust(enabled) => format!("t({})", polarity.level(*enabled)),
            PeripheralCommand::BottomExhaust(enabled) => {
                format!("b({})", polarity.level(*enabled))
            }
        }
    }
}

impl fmt::Display for PeripheralCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeripheralCommand::LaserPower(power) => write!(f, "laser power {:.3}", power),
            PeripheralCommand::TopExhaust(on) => {
                write!(f, "top exhaust {}", if *on { "on" } else { "off" })
            }
            PeripheralCommand::BottomExhaust(on) => {
                write!(f, "bottom exhaust {}", if *on { "on" } else { "off" })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_laser_power_scaling() {
        let polarity = ExhaustPolarity::default();
        assert_eq!(PeripheralCommand::LaserPower(0.0).token(polarity), "l(0)");
        assert_eq!(PeripheralCommand::LaserPower(0.5).token(polarity), "l(2047)");
        assert_eq!(PeripheralCommand::LaserPower(1.0).token(polarity), "l(4095)");
        assert_eq!(PeripheralCommand::LaserPower(1.7).token(polarity), "l(4095)");
        assert_eq!(PeripheralCommand::LaserPower(-0.2).token(polarity), "l(0)");
        assert_eq!(PeripheralCommand::LaserPower(f32::NAN).token(polarity), "l(0)");
    }

    #[test]
    fn test_exhaust_polarity() {
        let low = ExhaustPolarity::ActiveLow;
        assert_eq!(PeripheralCommand::TopExhaust(true).token(low), "t(0)");
        assert_eq!(PeripheralCommand::TopExhaust(false).token(low), "t(1)");
        assert_eq!(PeripheralCommand::BottomExhaust(true).token(low), "b(0)");

        let high = ExhaustPolarity::ActiveHigh;
        assert_eq!(PeripheralCommand::TopExhaust(true).token(high), "t(1)");
        assert_eq!(PeripheralCommand::BottomExhaust(false).token(high), "b(0)");
    }
}
