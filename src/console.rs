//! Operator console
//!
//! One command per line on stdin, translated into [`UserCommand`]s for the
//! control loop.

use focuskit_automation::UserCommand;
use focuskit_communication::PeripheralCommand;
use std::path::PathBuf;
use thiserror::Error;

pub const HELP: &str = "\
commands:
  connect | disconnect
  load <file> | play | pause | stop
  send <gcode>
  enable | disable | zero
  autosend position|power on|off
  power-range <min> <max>
  laser <fraction>
  exhaust top|bottom on|off
  status | help | quit";

/// A parsed console line
#[derive(Debug)]
pub enum ConsoleCommand {
    /// Forward to the control loop
    Control(UserCommand),
    Status,
    Help,
    Quit,
    /// Blank line
    Nothing,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsoleError {
    #[error("Unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("'{value}' is not a number")]
    InvalidNumber { value: String },
}

/// Parse one console line
pub fn parse(line: &str) -> Result<ConsoleCommand, ConsoleError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    let control = |command: UserCommand| -> Result<ConsoleCommand, ConsoleError> {
        Ok(ConsoleCommand::Control(command))
    };

    match word.to_ascii_lowercase().as_str() {
        "" => Ok(ConsoleCommand::Nothing),
        "connect" => control(UserCommand::Connect),
        "disconnect" => control(UserCommand::Disconnect),
        "load" => {
            if rest.is_empty() {
                return Err(ConsoleError::Usage("load <file>"));
            }
            control(UserCommand::Load(PathBuf::from(rest)))
        }
        "play" => control(UserCommand::Play),
        "pause" => control(UserCommand::Pause),
        "stop" => control(UserCommand::Stop),
        "send" => {
            if rest.is_empty() {
                return Err(ConsoleError::Usage("send <gcode>"));
            }
            control(UserCommand::Send(rest.to_string()))
        }
        "enable" => control(UserCommand::SetEnabled(true)),
        "disable" => control(UserCommand::SetEnabled(false)),
        "zero" => control(UserCommand::Zero),
        "autosend" => {
            const USAGE: &str = "autosend position|power on|off";
            let [target, state] = args[..] else {
                return Err(ConsoleError::Usage(USAGE));
            };
            let on = on_off(state).ok_or(ConsoleError::Usage(USAGE))?;
            match target {
                "position" => control(UserCommand::SetAutosendPosition(on)),
                "power" => control(UserCommand::SetAutosendPower(on)),
                _ => Err(ConsoleError::Usage(USAGE)),
            }
        }
        "power-range" => {
            let [min, max] = args[..] else {
                return Err(ConsoleError::Usage("power-range <min> <max>"));
            };
            control(UserCommand::SetPowerRange {
                min: number(min)?,
                max: number(max)?,
            })
        }
        "laser" => {
            let [power] = args[..] else {
                return Err(ConsoleError::Usage("laser <fraction>"));
            };
            control(UserCommand::Peripheral(PeripheralCommand::LaserPower(
                number(power)?,
            )))
        }
        "exhaust" => {
            const USAGE: &str = "exhaust top|bottom on|off";
            let [which, state] = args[..] else {
                return Err(ConsoleError::Usage(USAGE));
            };
            let on = on_off(state).ok_or(ConsoleError::Usage(USAGE))?;
            match which {
                "top" => control(UserCommand::Peripheral(PeripheralCommand::TopExhaust(on))),
                "bottom" => control(UserCommand::Peripheral(PeripheralCommand::BottomExhaust(
                    on,
                ))),
                _ => Err(ConsoleError::Usage(USAGE)),
            }
        }
        "status" => Ok(ConsoleCommand::Status),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        other => Err(ConsoleError::Unknown(other.to_string())),
    }
}

fn on_off(word: &str) -> Option<bool> {
    match word {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

fn number(word: &str) -> Result<f32, ConsoleError> {
    word.parse().map_err(|_| ConsoleError::InvalidNumber {
        value: word.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(line: &str) -> UserCommand {
        match parse(line) {
            Ok(ConsoleCommand::Control(command)) => command,
            other => panic!("{:?} for '{}'", other, line),
        }
    }

    #[test]
    fn test_simple_commands() {
        assert!(matches!(control("connect"), UserCommand::Connect));
        assert!(matches!(control("  PLAY "), UserCommand::Play));
        assert!(matches!(control("stop"), UserCommand::Stop));
        assert!(matches!(control("disable"), UserCommand::SetEnabled(false)));
        assert!(matches!(parse("status"), Ok(ConsoleCommand::Status)));
        assert!(matches!(parse("quit"), Ok(ConsoleCommand::Quit)));
        assert!(matches!(parse(""), Ok(ConsoleCommand::Nothing)));
    }

    #[test]
    fn test_arguments_keep_spacing() {
        match control("send G0  X1 Y2") {
            UserCommand::Send(text) => assert_eq!(text, "G0  X1 Y2"),
            other => panic!("{:?}", other),
        }
        match control("load /tmp/my job.gcode") {
            UserCommand::Load(path) => assert_eq!(path, PathBuf::from("/tmp/my job.gcode")),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_peripheral_and_automation() {
        assert!(matches!(
            control("autosend power on"),
            UserCommand::SetAutosendPower(true)
        ));
        assert!(matches!(
            control("exhaust bottom off"),
            UserCommand::Peripheral(PeripheralCommand::BottomExhaust(false))
        ));
        match control("power-range 0.2 0.7") {
            UserCommand::SetPowerRange { min, max } => {
                assert_eq!(min, 0.2);
                assert_eq!(max, 0.7);
            }
            other => panic!("{:?}", other),
        }
        assert!(matches!(
            control("laser 0.5"),
            UserCommand::Peripheral(PeripheralCommand::LaserPower(p)) if p == 0.5
        ));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse("jog x").unwrap_err(),
            ConsoleError::Unknown("jog".to_string())
        );
        assert!(matches!(parse("send"), Err(ConsoleError::Usage(_))));
        assert!(matches!(parse("autosend power maybe"), Err(ConsoleError::Usage(_))));
        assert!(matches!(parse("power-range 0.2"), Err(ConsoleError::Usage(_))));
        assert_eq!(
            parse("laser full").unwrap_err(),
            ConsoleError::InvalidNumber {
                value: "full".to_string()
            }
        );
    }
}
