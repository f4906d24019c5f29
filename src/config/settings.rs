//! Configuration sections
//!
//! Each section maps to one TOML table of the config file. Every field has a
//! default, so a partial (or empty) file is valid.
//!
//! # Main Types
//!
//! - [`SamplingSettings`] - producer period and waveform
//! - [`TransformSettings`] - optional control law script
//! - [`NetworkSettings`] - local interface, destination and readiness polling
//! - [`MonitorSettings`] - statistics period and stack budget overrides
//! - [`LoggingSettings`] - optional log file

use crate::backend::subnet_broadcast;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Default sampling period in milliseconds
pub const DEFAULT_SAMPLE_PERIOD_MS: u64 = 100;

/// Default monitor period in milliseconds
pub const DEFAULT_MONITOR_PERIOD_MS: u64 = 500;

/// Default delay between network readiness polls in milliseconds
pub const DEFAULT_READY_POLL_MS: u64 = 10;

/// Which table the sampling stage walks through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveformSource {
    /// Built-in 256-entry sine table
    #[default]
    Sine,
    /// Explicit list of samples
    Samples(Vec<i16>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingSettings {
    #[serde(default = "default_sample_period_ms")]
    pub period_ms: u64,

    #[serde(default)]
    pub waveform: WaveformSource,
}

fn default_sample_period_ms() -> u64 {
    DEFAULT_SAMPLE_PERIOD_MS
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_SAMPLE_PERIOD_MS,
            waveform: WaveformSource::default(),
        }
    }
}

impl SamplingSettings {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformSettings {
    /// Rhai expression over `sample`; inversion when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

/// Where telemetry datagrams go.
///
/// Written in TOML as `"broadcast"` or as an IP address string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Destination {
    /// Subnet broadcast of the local address (last octet 255)
    Broadcast,
    Address(IpAddr),
}

impl Default for Destination {
    fn default() -> Self {
        Destination::Address(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }
}

impl TryFrom<String> for Destination {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case("broadcast") {
            return Ok(Destination::Broadcast);
        }
        value
            .parse()
            .map(Destination::Address)
            .map_err(|e| format!("invalid destination '{}': {}", value, e))
    }
}

impl From<Destination> for String {
    fn from(value: Destination) -> Self {
        match value {
            Destination::Broadcast => "broadcast".to_string(),
            Destination::Address(ip) => ip.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Local interface address to bind
    #[serde(default = "default_local_ip")]
    pub local_ip: IpAddr,

    /// `"broadcast"` or an explicit address
    #[serde(default)]
    pub destination: Destination,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_ready_poll_ms")]
    pub ready_poll_ms: u64,
}

fn default_local_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    crate::wire::SENSOR_DATA_PORT
}

fn default_ready_poll_ms() -> u64 {
    DEFAULT_READY_POLL_MS
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            local_ip: default_local_ip(),
            destination: Destination::default(),
            port: default_port(),
            ready_poll_ms: DEFAULT_READY_POLL_MS,
        }
    }
}

impl NetworkSettings {
    /// Destination address, resolving `broadcast` against `local_ip`.
    pub fn destination_ip(&self) -> IpAddr {
        match (self.destination, self.local_ip) {
            (Destination::Address(ip), _) => ip,
            (Destination::Broadcast, IpAddr::V4(v4)) => IpAddr::V4(subnet_broadcast(v4)),
            (Destination::Broadcast, IpAddr::V6(_)) => IpAddr::V4(Ipv4Addr::BROADCAST),
        }
    }

    pub fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "default_monitor_period_ms")]
    pub period_ms: u64,

    /// Stack budget overrides in bytes, keyed by task name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub stack_budgets: HashMap<String, usize>,
}

fn default_monitor_period_ms() -> u64 {
    DEFAULT_MONITOR_PERIOD_MS
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_MONITOR_PERIOD_MS,
            stack_budgets: HashMap::new(),
        }
    }
}

impl MonitorSettings {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Daily-rolling log file; console only when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}
