//! FocusKit Settings Crate
//!
//! Configuration model for the telemetry channel, the machine link, the
//! focus extractor and the automation coordinator, with TOML/JSON
//! persistence.

pub mod config;
pub mod error;

pub use config::{
    default_config_path, Config, LinkSettings, TelemetrySettings, VisionSettings,
};
pub use error::{SettingsError, SettingsResult};
