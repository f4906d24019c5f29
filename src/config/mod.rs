//! Configuration module for the telemetry pipeline
//!
//! The whole runtime is described by one [`AppConfig`], stored as TOML.
//!
//! # Config Location
//!
//! Without an explicit `--config` path the file is looked up in the
//! platform-appropriate config directory under `telemetry-pipeline`:
//! - **Linux**: `~/.config/telemetry-pipeline/config.toml`
//! - **macOS**: `~/Library/Application Support/telemetry-pipeline/config.toml`
//! - **Windows**: `%APPDATA%\telemetry-pipeline\config.toml`
//!
//! A missing file means defaults.
//!
//! # Example
//!
//! ```toml
//! [sampling]
//! period_ms = 100
//!
//! [transform]
//! script = "-sample / 2"
//!
//! [network]
//! local_ip = "192.168.1.42"
//! destination = "broadcast"
//! port = 9889
//!
//! [monitor]
//! period_ms = 500
//!
//! [monitor.stack_budgets]
//! Comms = 131072
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{Result, TelemetryError};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "telemetry-pipeline";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sampling: SamplingSettings,

    #[serde(default)]
    pub transform: TransformSettings,

    #[serde(default)]
    pub network: NetworkSettings,

    #[serde(default)]
    pub monitor: MonitorSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TelemetryError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| e.with_context(format!("Failed to parse {}", path.display())))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| TelemetryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or the default location when `None`.
    ///
    /// A missing file gives defaults; an unreadable or invalid one is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => {
                    tracing::warn!("Could not determine config directory, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        tracing::info!("Loading config from {}", path.display());
        Self::load(&path)
    }

    /// Save config to a file, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    TelemetryError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = self.to_toml_string()?;
        std::fs::write(path, content)
            .map_err(|e| TelemetryError::Config(format!("Failed to write config: {}", e)))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| TelemetryError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.sampling.period_ms == 0 {
            return Err(TelemetryError::Config(
                "sampling.period_ms must be greater than 0".to_string(),
            ));
        }
        if self.monitor.period_ms == 0 {
            return Err(TelemetryError::Config(
                "monitor.period_ms must be greater than 0".to_string(),
            ));
        }
        if self.network.port == 0 {
            return Err(TelemetryError::Config(
                "network.port must not be 0".to_string(),
            ));
        }
        if let WaveformSource::Samples(samples) = &self.sampling.waveform {
            if samples.is_empty() {
                return Err(TelemetryError::Config(
                    "sampling.waveform must contain at least one sample".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Socket address telemetry is sent to.
    pub fn destination_addr(&self) -> SocketAddr {
        SocketAddr::new(self.network.destination_ip(), self.network.port)
    }
}
