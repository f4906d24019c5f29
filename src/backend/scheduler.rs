//! Scheduler accounting interface.
//!
//! The monitor never talks to threads directly; it asks a
//! [`SchedulerAccounting`] implementation for a consistent snapshot of every
//! live task. The hosted implementation is [`super::TaskTable`]; tests use
//! [`super::mock::ScriptedScheduler`] or a mockall mock.

use std::fmt;

/// Transient identity of a running task.
///
/// Only meaningful while the task is alive. Identities are never reused by
/// the hosted scheduler.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u32);

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-task accounting as reported by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    pub id: TaskId,
    pub name: String,
    pub priority: u8,
    /// Cumulative runtime in scheduler ticks (microseconds on hosts)
    pub runtime: u64,
    /// Smallest amount of free stack ever observed, in bytes
    pub stack_high_water: usize,
}

/// Every live task plus the scheduler-wide runtime counter, taken atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemSnapshot {
    pub tasks: Vec<TaskStatus>,
    /// Scheduler-wide runtime counter in the same units as `TaskStatus::runtime`
    pub total_runtime: u64,
}

/// Source of runtime accounting data.
#[cfg_attr(test, mockall::automock)]
pub trait SchedulerAccounting: Send {
    /// Number of tasks currently alive
    fn task_count(&self) -> usize;

    /// Atomic, consistent copy of all task accounting
    fn snapshot(&self) -> SystemSnapshot;
}
