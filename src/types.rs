//! Core data types for the telemetry pipeline
//!
//! This module contains the values that flow between stages and the static
//! description of the fixed task set.
//!
//! # Main Types
//!
//! - [`Sample`] - One sensor reading produced by the sampling stage
//! - [`Command`] - The transform stage's output for one sample
//! - [`ActuatorState`] - The `{sample, command}` pair handed to the transmit stage
//! - [`TaskKind`] - The tasks this system spawns, with their names,
//!   priorities and stack budgets
//!
//! # Task Set
//!
//! The task set is fixed at build time. The monitor's stack budget table is
//! derived from [`TaskKind::ALL`], so a task that is spawned by the runtime
//! always has a budget entry.

use serde::{Deserialize, Serialize};

/// One sensor reading.
pub type Sample = i16;

/// Output of the control law for one [`Sample`].
pub type Command = i16;

/// Item carried on the command → transmit channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorState {
    pub sample: Sample,
    pub command: Command,
}

/// Stack budget of the smallest task, in bytes.
pub const MINIMAL_STACK_SIZE: usize = 256 * 1024;

/// Lowest scheduling priority.
pub const IDLE_PRIORITY: u8 = 0;

/// The tasks spawned by [`crate::runtime::Runtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    /// Periodic sampling stage
    Sensor,
    /// Transform stage
    Actuator,
    /// Transmit stage
    Comms,
    /// Runtime statistics monitor
    Stats,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::Sensor,
        TaskKind::Actuator,
        TaskKind::Comms,
        TaskKind::Stats,
    ];

    /// Task name as reported by the scheduler
    pub const fn name(self) -> &'static str {
        match self {
            TaskKind::Sensor => "Sensor",
            TaskKind::Actuator => "Actuator",
            TaskKind::Comms => "Comms",
            TaskKind::Stats => "Stats",
        }
    }

    pub const fn priority(self) -> u8 {
        match self {
            TaskKind::Sensor | TaskKind::Actuator | TaskKind::Comms => IDLE_PRIORITY + 4,
            TaskKind::Stats => IDLE_PRIORITY + 1,
        }
    }

    /// Stack budget in bytes
    pub const fn stack_size(self) -> usize {
        match self {
            TaskKind::Sensor | TaskKind::Actuator | TaskKind::Comms => MINIMAL_STACK_SIZE,
            TaskKind::Stats => 2 * MINIMAL_STACK_SIZE,
        }
    }

    pub fn from_name(name: &str) -> Option<TaskKind> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
