//! Pipeline-specific error types.
//!
//! None of these are fatal. Each stage absorbs its own conditions locally
//! (log and carry on); they never cross a channel boundary.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur within the pipeline stages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Channel {0} is full, item dropped")]
    ChannelFull(&'static str),

    #[error("Channel {0} is closed")]
    ChannelClosed(&'static str),

    #[error("Deadline missed by {late:?}")]
    DeadlineMissed { late: Duration },

    #[error("Transmit failed: {0}")]
    TransmitFailed(String),

    #[error("Control law error: {0}")]
    ControlLaw(String),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
