//! # telemetry-pipeline: periodic sample/transform/transmit telemetry
//!
//! A small real-time pipeline: a periodic sampling stage produces readings, a
//! transform stage turns each reading into a command, and a transmit stage
//! sends both as fixed 11-byte UDP datagrams. An independent monitor
//! periodically reports per-task CPU utilization and stack headroom.
//!
//! ## Architecture
//!
//! - **Pipeline**: three stages joined by bounded SPSC channels (capacity 8);
//!   producers drop on full, consumers block
//! - **Wire**: explicit field-by-field little-endian codec with a size assertion
//! - **Monitor**: fixed-capacity registry mapping task identities to
//!   accounting slots across epochs
//! - **Backend**: scheduler and network collaborators behind traits, with
//!   std-thread/UDP implementations and test doubles
//! - **Scripting**: optional Rhai control law in place of inversion
//!
//! ## Configuration
//!
//! The runtime is described by a TOML [`AppConfig`], by default read from the
//! platform config directory under `telemetry-pipeline`:
//!
//! - **Linux**: `~/.config/telemetry-pipeline/config.toml`
//! - **macOS**: `~/Library/Application Support/telemetry-pipeline/config.toml`
//! - **Windows**: `%APPDATA%\telemetry-pipeline\config.toml`
//!
//! ## Example
//!
//! ```ignore
//! use telemetry_pipeline::{AppConfig, Runtime};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load_or_default(None)?;
//!     let runtime = Runtime::start(&config)?;
//!     runtime.join();
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod monitor;
pub mod pipeline;
pub mod runtime;
pub mod scripting;
pub mod types;
pub mod wire;

// Re-export commonly used types
pub use backend::{NetworkStack, SchedulerAccounting, TaskTable, UdpNetwork};
pub use config::AppConfig;
pub use error::{Result, TelemetryError};
pub use monitor::{MonitorError, MonitorStage, StatsRegistry, UtilizationRecord};
pub use pipeline::{PipelineError, SamplingStage, TransformStage, TransmitStage};
pub use runtime::Runtime;
pub use scripting::ControlLaw;
pub use types::{ActuatorState, Command, Sample, TaskKind};
pub use wire::{decode, encode, MalformedMessage, WireMessage};
