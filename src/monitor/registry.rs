//! Identity to accounting-slot arena.
//!
//! The registry holds at most [`MAX_TASKS`] slots. A slot is allocated the
//! first time an identity shows up in a snapshot and is never freed or
//! reassigned afterwards. Lookup is a linear scan over the arena; with at
//! most a dozen entries that is cheaper than hashing.

use crate::backend::{SystemSnapshot, TaskId, TaskStatus};
use crate::monitor::MonitorError;
use crate::types::TaskKind;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Registry capacity.
pub const MAX_TASKS: usize = 12;

/// Position of a slot in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotIndex(usize);

impl SlotIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatSlot {
    pub id: TaskId,
    pub name: String,
    pub stack_budget: usize,
    /// Cumulative runtime seen at the previous epoch
    pub last_runtime: u64,
}

/// Stack budget in bytes per task name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackBudgets {
    budgets: HashMap<String, usize>,
}

impl Default for StackBudgets {
    fn default() -> Self {
        Self::from_task_kinds()
    }
}

impl StackBudgets {
    pub fn empty() -> Self {
        Self {
            budgets: HashMap::new(),
        }
    }

    /// Budgets of every task the runtime spawns.
    pub fn from_task_kinds() -> Self {
        let budgets = TaskKind::ALL
            .iter()
            .map(|k| (k.name().to_string(), k.stack_size()))
            .collect();
        Self { budgets }
    }

    /// Replace or add entries.
    pub fn with_overrides(mut self, overrides: &HashMap<String, usize>) -> Self {
        for (name, budget) in overrides {
            self.budgets.insert(name.clone(), *budget);
        }
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, budget: usize) {
        self.budgets.insert(name.into(), budget);
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.budgets.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.budgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.budgets.is_empty()
    }
}

/// One task's utilization over one epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UtilizationRecord {
    pub id: u32,
    pub name: String,
    pub stack_budget: usize,
    pub stack_high_water: usize,
    pub delta_runtime: u64,
    pub delta_total: u64,
}

impl UtilizationRecord {
    /// Share of the epoch spent in this task, in percent, never below 1.
    pub fn cpu_percent(&self) -> u64 {
        let per_cent = (self.delta_total / 100).max(1);
        (self.delta_runtime / per_cent).max(1)
    }

    /// Bytes of stack the task has used at its deepest.
    pub fn stack_used(&self) -> usize {
        self.stack_budget.saturating_sub(self.stack_high_water)
    }
}

impl fmt::Display for UtilizationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<10} {:>10} {:>4}% stack {}/{}",
            self.name,
            self.delta_runtime,
            self.cpu_percent(),
            self.stack_used(),
            self.stack_budget
        )
    }
}

#[derive(Debug)]
pub struct StatsRegistry {
    slots: Box<[Option<StatSlot>]>,
    last_total: u64,
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::with_capacity(MAX_TASKS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
            last_total: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scheduler-wide total recorded at the end of the previous epoch.
    pub fn last_total(&self) -> u64 {
        self.last_total
    }

    pub fn find(&self, id: TaskId) -> Option<SlotIndex> {
        self.slots
            .iter()
            .position(|s| matches!(s, Some(slot) if slot.id == id))
            .map(SlotIndex)
    }

    /// Claim the first free slot.
    pub fn allocate(
        &mut self,
        id: TaskId,
        name: &str,
        stack_budget: usize,
    ) -> Result<SlotIndex, MonitorError> {
        let capacity = self.capacity();
        let observed = self.len() + 1;
        let Some(index) = self.slots.iter().position(|s| s.is_none()) else {
            return Err(MonitorError::RegistryCapacityExceeded { observed, capacity });
        };
        self.slots[index] = Some(StatSlot {
            id,
            name: name.to_string(),
            stack_budget,
            last_runtime: 0,
        });
        tracing::debug!("Stats slot {} assigned to {} ({})", index, name, id);
        Ok(SlotIndex(index))
    }

    /// Existing slot for the task, or a new one with its configured budget.
    pub fn resolve(
        &mut self,
        task: &TaskStatus,
        budgets: &StackBudgets,
    ) -> Result<SlotIndex, MonitorError> {
        if let Some(index) = self.find(task.id) {
            return Ok(index);
        }
        let budget = budgets
            .get(&task.name)
            .ok_or_else(|| MonitorError::UnconfiguredIdentity {
                id: task.id,
                name: task.name.clone(),
            })?;
        self.allocate(task.id, &task.name, budget)
    }

    pub fn slot(&self, index: SlotIndex) -> Option<&StatSlot> {
        self.slots.get(index.0).and_then(|s| s.as_ref())
    }

    pub fn slot_mut(&mut self, index: SlotIndex) -> Option<&mut StatSlot> {
        self.slots.get_mut(index.0).and_then(|s| s.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatSlot> {
        self.slots.iter().flatten()
    }

    /// Account one snapshot.
    ///
    /// Records are produced only when at least `min_total_delta` ticks of
    /// scheduler time elapsed since the previous epoch. Slot counters and the
    /// stored total advance either way.
    pub fn record_epoch(
        &mut self,
        snapshot: &SystemSnapshot,
        budgets: &StackBudgets,
        min_total_delta: u64,
    ) -> Result<Vec<UtilizationRecord>, MonitorError> {
        if snapshot.tasks.len() > self.capacity() {
            return Err(MonitorError::RegistryCapacityExceeded {
                observed: snapshot.tasks.len(),
                capacity: self.capacity(),
            });
        }

        let delta_total = snapshot.total_runtime.saturating_sub(self.last_total);
        let emit = delta_total >= min_total_delta;
        let mut records = Vec::with_capacity(if emit { snapshot.tasks.len() } else { 0 });

        for task in &snapshot.tasks {
            let index = self.resolve(task, budgets)?;
            let Some(slot) = self.slot_mut(index) else {
                continue;
            };
            let delta_runtime = task.runtime.saturating_sub(slot.last_runtime);
            if emit {
                records.push(UtilizationRecord {
                    id: task.id.0,
                    name: task.name.clone(),
                    stack_budget: slot.stack_budget,
                    stack_high_water: task.stack_high_water,
                    delta_runtime,
                    delta_total,
                });
            }
            slot.last_runtime = task.runtime;
        }

        self.last_total = snapshot.total_runtime;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: u32, name: &str, runtime: u64) -> TaskStatus {
        TaskStatus {
            id: TaskId(id),
            name: name.to_string(),
            priority: 1,
            runtime,
            stack_high_water: 1000,
        }
    }

    fn budgets() -> StackBudgets {
        let mut b = StackBudgets::from_task_kinds();
        for i in 0..16 {
            b.insert(format!("T{}", i), 4096);
        }
        b
    }

    #[test]
    fn test_default_budgets_cover_task_kinds() {
        let b = StackBudgets::default();
        for kind in TaskKind::ALL {
            assert_eq!(b.get(kind.name()), Some(kind.stack_size()));
        }
        assert_eq!(b.get("IDLE"), None);
    }

    #[test]
    fn test_overrides() {
        let mut overrides = HashMap::new();
        overrides.insert("Comms".to_string(), 1234);
        overrides.insert("Extra".to_string(), 99);
        let b = StackBudgets::default().with_overrides(&overrides);
        assert_eq!(b.get("Comms"), Some(1234));
        assert_eq!(b.get("Extra"), Some(99));
        assert_eq!(b.get("Sensor"), Some(TaskKind::Sensor.stack_size()));
    }

    #[test]
    fn test_resolve_is_stable() {
        let mut reg = StatsRegistry::new();
        let b = budgets();
        let a = reg.resolve(&task(7, "Sensor", 0), &b).unwrap();
        let again = reg.resolve(&task(7, "Sensor", 50), &b).unwrap();
        assert_eq!(a, again);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.slot(a).unwrap().stack_budget, TaskKind::Sensor.stack_size());
    }

    #[test]
    fn test_first_free_slot() {
        let mut reg = StatsRegistry::with_capacity(3);
        let b = budgets();
        assert_eq!(reg.resolve(&task(10, "T0", 0), &b).unwrap().get(), 0);
        assert_eq!(reg.resolve(&task(20, "T1", 0), &b).unwrap().get(), 1);
        assert_eq!(reg.resolve(&task(30, "T2", 0), &b).unwrap().get(), 2);
        assert_eq!(
            reg.resolve(&task(40, "T3", 0), &b),
            Err(MonitorError::RegistryCapacityExceeded {
                observed: 4,
                capacity: 3
            })
        );
    }

    #[test]
    fn test_unmapped_name() {
        let mut reg = StatsRegistry::new();
        let err = reg
            .resolve(&task(3, "Mystery", 0), &StackBudgets::default())
            .unwrap_err();
        assert_eq!(
            err,
            MonitorError::UnconfiguredIdentity {
                id: TaskId(3),
                name: "Mystery".to_string()
            }
        );
        assert!(reg.is_empty());
    }

    #[test]
    fn test_thirteen_tasks_exceed_capacity() {
        let mut reg = StatsRegistry::new();
        let snapshot = SystemSnapshot {
            tasks: (0..13).map(|i| task(i, &format!("T{}", i), 0)).collect(),
            total_runtime: 10_000,
        };
        assert_eq!(
            reg.record_epoch(&snapshot, &budgets(), 100),
            Err(MonitorError::RegistryCapacityExceeded {
                observed: 13,
                capacity: MAX_TASKS
            })
        );
    }

    #[test]
    fn test_epoch_deltas() {
        let mut reg = StatsRegistry::new();
        let b = budgets();

        let first = SystemSnapshot {
            tasks: vec![task(1, "Sensor", 200), task(2, "Comms", 800)],
            total_runtime: 10_000,
        };
        let records = reg.record_epoch(&first, &b, 100).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].delta_runtime, 200);
        assert_eq!(records[0].delta_total, 10_000);
        assert_eq!(records[1].cpu_percent(), 8);

        let second = SystemSnapshot {
            tasks: vec![task(1, "Sensor", 700), task(2, "Comms", 800)],
            total_runtime: 20_000,
        };
        let records = reg.record_epoch(&second, &b, 100).unwrap();
        assert_eq!(records[0].delta_runtime, 500);
        assert_eq!(records[0].cpu_percent(), 5);
        assert_eq!(records[1].delta_runtime, 0);
        // Idle tasks still report at least 1%
        assert_eq!(records[1].cpu_percent(), 1);
        assert_eq!(reg.last_total(), 20_000);
    }

    #[test]
    fn test_small_delta_total_updates_without_records() {
        let mut reg = StatsRegistry::new();
        let b = budgets();
        let snap = SystemSnapshot {
            tasks: vec![task(1, "Sensor", 10)],
            total_runtime: 50,
        };
        assert!(reg.record_epoch(&snap, &b, 100).unwrap().is_empty());
        assert_eq!(reg.last_total(), 50);
        assert_eq!(reg.iter().next().unwrap().last_runtime, 10);
    }

    #[test]
    fn test_runtime_going_backwards_is_clamped() {
        let mut reg = StatsRegistry::new();
        let b = budgets();
        let a = SystemSnapshot {
            tasks: vec![task(1, "Sensor", 500)],
            total_runtime: 1_000,
        };
        reg.record_epoch(&a, &b, 100).unwrap();
        let c = SystemSnapshot {
            tasks: vec![task(1, "Sensor", 400)],
            total_runtime: 2_000,
        };
        let records = reg.record_epoch(&c, &b, 100).unwrap();
        assert_eq!(records[0].delta_runtime, 0);
    }

    #[test]
    fn test_empty_snapshot() {
        let mut reg = StatsRegistry::new();
        let snap = SystemSnapshot {
            tasks: vec![],
            total_runtime: 5_000,
        };
        assert!(reg.record_epoch(&snap, &budgets(), 100).unwrap().is_empty());
        assert_eq!(reg.last_total(), 5_000);
    }

    #[test]
    fn test_record_display() {
        let r = UtilizationRecord {
            id: 1,
            name: "Sensor".into(),
            stack_budget: 4096,
            stack_high_water: 1096,
            delta_runtime: 2_500,
            delta_total: 10_000,
        };
        assert_eq!(r.stack_used(), 3000);
        let line = r.to_string();
        assert!(line.contains("Sensor"));
        assert!(line.contains("25%"));
        assert!(line.contains("3000/4096"));
    }
}
