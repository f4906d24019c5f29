//! Error handling for the telemetry pipeline
//!
//! This module defines the crate-wide error type and a Result alias. Stage
//! level conditions (drops, missed deadlines, fatal registry errors) live in
//! [`crate::pipeline::PipelineError`] and [`crate::monitor::MonitorError`];
//! they convert into [`TelemetryError`] when they have to cross a module
//! boundary.

use crate::monitor::MonitorError;
use crate::pipeline::PipelineError;
use crate::wire::MalformedMessage;
use thiserror::Error;

/// Main error type for telemetry pipeline operations
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Errors raised by a pipeline stage
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Errors raised by the runtime statistics monitor
    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// Wire decode failures
    #[error("Wire error: {0}")]
    Wire(#[from] MalformedMessage),

    /// Errors related to Rhai control law scripts
    #[error("Script error: {0}")]
    Script(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to the network collaborator
    #[error("Network error: {0}")]
    Network(String),

    /// Errors related to task creation
    #[error("Task error: {0}")]
    Task(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<TelemetryError>,
    },
}

impl TelemetryError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        TelemetryError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a script error from a Rhai error
    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        TelemetryError::Script(err.to_string())
    }

    /// Whether this error must take the whole process down
    pub fn is_fatal(&self) -> bool {
        match self {
            TelemetryError::Monitor(e) => e.is_fatal(),
            TelemetryError::WithContext { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

/// Result type alias for telemetry pipeline operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, Box<rhai::EvalAltResult>> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| TelemetryError::from_rhai_error(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| TelemetryError::from_rhai_error(e).with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| TelemetryError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| TelemetryError::Io(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::TaskId;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::Config("missing network section".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: missing network section"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = TelemetryError::Network("link down".to_string());
        let with_ctx = err.with_context("Failed to open socket");
        assert!(with_ctx.to_string().contains("Failed to open socket"));
        assert!(with_ctx.to_string().contains("link down"));
    }

    #[test]
    fn test_fatal_classification() {
        let fatal: TelemetryError = MonitorError::RegistryCapacityExceeded {
            observed: 13,
            capacity: 12,
        }
        .into();
        assert!(fatal.is_fatal());
        assert!(fatal.with_context("stats poll").is_fatal());

        let unconfigured: TelemetryError = MonitorError::UnconfiguredIdentity {
            id: TaskId(3),
            name: "Mystery".to_string(),
        }
        .into();
        assert!(unconfigured.is_fatal());

        let benign: TelemetryError = PipelineError::ChannelFull("adc_queue").into();
        assert!(!benign.is_fatal());
    }

    #[test]
    fn test_io_context() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "busy",
        ));
        let err = res.context("bind listener").unwrap_err();
        assert!(err.to_string().starts_with("bind listener"));
    }
}
