//! Runtime statistics monitor.
//!
//! Every period the monitor takes a scheduler snapshot and reports, per task,
//! how much of the elapsed runtime the task used and how close it came to its
//! stack budget.
//!
//! # Components
//!
//! - [`StatsRegistry`] - fixed-capacity arena mapping transient task
//!   identities to persistent accounting slots
//! - [`StackBudgets`] - task name to stack budget table
//! - [`MonitorStage`] - the periodic poller
//! - [`UtilizationRecord`] - one task's figures for one epoch
//!
//! # Fatal conditions
//!
//! Both [`MonitorError`] variants mean the system is not the one the monitor
//! was configured for. The monitor logs them at error level and aborts the
//! process.

pub mod registry;
pub mod stage;

pub use crate::backend::TaskId;
pub use registry::{SlotIndex, StackBudgets, StatSlot, StatsRegistry, UtilizationRecord, MAX_TASKS};
pub use stage::{MonitorStage, DEFAULT_MONITOR_PERIOD, MIN_TOTAL_DELTA, STATS_TARGET};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("{observed} tasks exceed the stats registry capacity of {capacity}")]
    RegistryCapacityExceeded { observed: usize, capacity: usize },

    #[error("No stack budget configured for task '{name}' ({id})")]
    UnconfiguredIdentity { id: TaskId, name: String },
}

impl MonitorError {
    /// Whether the process must stop. Currently every monitor error is fatal.
    pub fn is_fatal(&self) -> bool {
        match self {
            MonitorError::RegistryCapacityExceeded { .. } => true,
            MonitorError::UnconfiguredIdentity { .. } => true,
        }
    }
}
