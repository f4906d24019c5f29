//! Test data builders for creating test objects

use telemetry_pipeline::backend::{SystemSnapshot, TaskId, TaskStatus};
use telemetry_pipeline::TaskKind;

/// Builder for a scheduler snapshot
pub struct SnapshotBuilder {
    tasks: Vec<TaskStatus>,
    total_runtime: u64,
}

impl SnapshotBuilder {
    pub fn new(total_runtime: u64) -> Self {
        Self {
            tasks: Vec::new(),
            total_runtime,
        }
    }

    /// Add a task with an arbitrary name.
    pub fn task(mut self, id: u32, name: &str, runtime: u64) -> Self {
        self.tasks.push(TaskStatus {
            id: TaskId(id),
            name: name.to_string(),
            priority: 1,
            runtime,
            stack_high_water: 512,
        });
        self
    }

    /// Add one of the runtime's own tasks.
    pub fn kind(mut self, id: u32, kind: TaskKind, runtime: u64) -> Self {
        self.tasks.push(TaskStatus {
            id: TaskId(id),
            name: kind.name().to_string(),
            priority: kind.priority(),
            runtime,
            stack_high_water: kind.stack_size() / 4,
        });
        self
    }

    pub fn build(self) -> SystemSnapshot {
        SystemSnapshot {
            tasks: self.tasks,
            total_runtime: self.total_runtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_builder() {
        let snap = SnapshotBuilder::new(1_000)
            .kind(1, TaskKind::Sensor, 10)
            .task(9, "Other", 20)
            .build();

        assert_eq!(snap.total_runtime, 1_000);
        assert_eq!(snap.tasks.len(), 2);
        assert_eq!(snap.tasks[0].name, "Sensor");
        assert_eq!(snap.tasks[1].id, TaskId(9));
    }
}
