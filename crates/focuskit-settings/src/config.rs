//! Configuration for FocusKit
//!
//! Configuration is organized into logical sections:
//! - Telemetry channel (listen address, peripheral peer, record layout)
//! - Machine command link (address, connect timeout)
//! - Focus extractor (detection parameters, optical geometry, hold timeout)
//! - Automation coordinator
//!
//! Files are TOML or JSON, chosen by extension.

use crate::error::{SettingsError, SettingsResult};
use focuskit_automation::AutomationConfig;
use focuskit_communication::{ExhaustPolarity, TelemetryLayout};
use focuskit_vision::{DetectionParams, OpticalGeometry};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "focuskit";
const CONFIG_FILE: &str = "config.toml";

/// UDP telemetry and peripheral channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Local address the telemetry listener binds
    pub listen: String,
    /// Peripheral controller receiving laser and exhaust tokens
    pub peer: String,
    /// Record layout revision sent by the machine
    pub layout: TelemetryLayout,
    /// Silence after which telemetry counts as lost
    pub liveness_ms: u64,
    /// Exhaust switch polarity of the peripheral controller
    pub exhaust_polarity: ExhaustPolarity,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:45454".to_string(),
            peer: "192.168.88.99:9999".to_string(),
            layout: TelemetryLayout::Rev1,
            liveness_ms: 500,
            exhaust_polarity: ExhaustPolarity::ActiveLow,
        }
    }
}

impl TelemetrySettings {
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_ms)
    }

    /// Peer address; fails on a malformed value
    pub fn peer_addr(&self) -> SettingsResult<SocketAddr> {
        self.peer
            .parse()
            .map_err(|e| SettingsError::invalid("telemetry.peer", e))
    }
}

/// Persistent TCP link to the machine controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Controller address, `host:port`
    pub address: String,
    /// Connect attempt timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            address: "10.0.1.1:5555".to_string(),
            connect_timeout_ms: 2000,
        }
    }
}

impl LinkSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Focus extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    /// Time in Hold before the lock is lost, milliseconds
    pub hold_ms: u64,
    pub detection: DetectionParams,
    pub geometry: OpticalGeometry,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            hold_ms: 2000,
            detection: DetectionParams::default(),
            geometry: OpticalGeometry::default(),
        }
    }
}

impl VisionSettings {
    pub fn hold_timeout(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telemetry: TelemetrySettings,
    pub link: LinkSettings,
    pub vision: VisionSettings,
    pub automation: AutomationConfig,
}

impl Config {
    /// Create new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = Format::of(path)?;
        let content = std::fs::read_to_string(path)?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;
        let format = Format::of(path)?;

        let content = match format {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        tracing::info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if !path.exists() {
            tracing::info!(
                "No configuration at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        // Telemetry
        self.telemetry
            .listen
            .parse::<SocketAddr>()
            .map_err(|e| SettingsError::invalid("telemetry.listen", e))?;
        self.telemetry.peer_addr()?;
        if self.telemetry.liveness_ms == 0 {
            return Err(SettingsError::invalid("telemetry.liveness_ms", "must be > 0"));
        }

        // Link
        match self.link.address.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => {
                return Err(SettingsError::invalid(
                    "link.address",
                    format!("'{}' is not host:port", self.link.address),
                ))
            }
        }
        if self.link.connect_timeout_ms == 0 {
            return Err(SettingsError::invalid("link.connect_timeout_ms", "must be > 0"));
        }

        // Vision
        if self.vision.hold_ms == 0 {
            return Err(SettingsError::invalid("vision.hold_ms", "must be > 0"));
        }
        self.vision
            .detection
            .clone()
            .clamped()
            .validate()
            .map_err(|e| SettingsError::invalid("vision.detection", e))?;
        let geometry = &self.vision.geometry;
        if geometry.pixels_per_mm <= 0.0 || geometry.focal_length <= 0.0 {
            return Err(SettingsError::invalid(
                "vision.geometry",
                "pixels_per_mm and focal_length must be > 0",
            ));
        }

        // Automation
        self.automation
            .power_range()
            .map_err(|e| SettingsError::invalid("automation.power", e))?;

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            other => Err(SettingsError::UnsupportedFormat(
                other.unwrap_or("none").to_string(),
            )),
        }
    }
}

/// `<config dir>/focuskit/config.toml`
pub fn default_config_path() -> SettingsResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
        .ok_or_else(|| {
            SettingsError::ConfigDirectory("no configuration directory on this platform".into())
        })
}
