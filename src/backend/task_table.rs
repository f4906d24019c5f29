//! Hosted scheduler: named std threads with runtime accounting.
//!
//! Every task spawned through [`TaskTable::spawn`] gets a [`TaskId`], a
//! stack budget (passed to the OS as the thread's stack size), a recorded
//! priority and a [`TaskContext`]. The context measures how long the task
//! is actually running: time spent inside [`TaskContext::blocking`]
//! (channel receives, periodic waits, readiness polls) is excluded.
//!
//! # Stack high-water estimate
//!
//! Hosts have no stack watermarking, so the context records the address of
//! a local variable at thread entry and compares it against the address of
//! a local in every probe. The deepest observed distance is subtracted from
//! the budget. The estimate only sees depths reached at probe points, so it
//! is optimistic.
//!
//! # Priorities
//!
//! std threads have no portable priority control. Priorities are recorded
//! and reported but scheduling is left to the OS.

use crate::backend::scheduler::{SchedulerAccounting, SystemSnapshot, TaskId, TaskStatus};
use crate::error::{Result, TelemetryError};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Shared accounting record for one task.
#[derive(Debug)]
struct TaskEntry {
    id: TaskId,
    name: String,
    priority: u8,
    stack_size: usize,
    runtime_ns: AtomicU64,
    max_stack_depth: AtomicUsize,
    alive: AtomicBool,
}

impl TaskEntry {
    fn new(id: TaskId, name: &str, priority: u8, stack_size: usize) -> Self {
        Self {
            id,
            name: name.to_string(),
            priority,
            stack_size,
            runtime_ns: AtomicU64::new(0),
            max_stack_depth: AtomicUsize::new(0),
            alive: AtomicBool::new(true),
        }
    }

    fn status(&self) -> TaskStatus {
        TaskStatus {
            id: self.id,
            name: self.name.clone(),
            priority: self.priority,
            runtime: self.runtime_ns.load(Ordering::Relaxed) / 1_000,
            stack_high_water: self
                .stack_size
                .saturating_sub(self.max_stack_depth.load(Ordering::Relaxed)),
        }
    }
}

#[derive(Debug)]
struct TableInner {
    epoch: Instant,
    next_id: AtomicU32,
    entries: RwLock<Vec<Arc<TaskEntry>>>,
}

/// Registry of spawned tasks. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TaskTable {
    inner: Arc<TableInner>,
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Join handle plus identity of a spawned task.
#[derive(Debug)]
pub struct TaskHandle {
    pub id: TaskId,
    pub name: String,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// Wait for the task to return. Returns `false` if it panicked.
    pub fn join(self) -> bool {
        self.join.join().is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Marks the entry dead when the task's thread ends, including on panic.
struct AliveGuard(Arc<TaskEntry>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.alive.store(false, Ordering::SeqCst);
    }
}

impl TaskTable {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TableInner {
                epoch: Instant::now(),
                next_id: AtomicU32::new(1),
                entries: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Spawn `f` on a new named thread with the given stack budget.
    pub fn spawn<F>(
        &self,
        name: &str,
        priority: u8,
        stack_size: usize,
        f: F,
    ) -> Result<TaskHandle>
    where
        F: FnOnce(TaskContext) + Send + 'static,
    {
        let entry = self.register(name, priority, stack_size)?;
        let id = entry.id;
        let thread_entry = entry.clone();

        let join = thread::Builder::new()
            .name(name.to_string())
            .stack_size(stack_size)
            .spawn(move || {
                let _alive = AliveGuard(thread_entry.clone());
                f(TaskContext::enter(thread_entry));
            })
            .map_err(|e| {
                entry.alive.store(false, Ordering::SeqCst);
                TelemetryError::Task(format!("Failed to spawn task {}: {}", name, e))
            })?;

        tracing::info!(
            "Spawned task {} ({}) priority {} stack {} bytes",
            name,
            id,
            priority,
            stack_size
        );

        Ok(TaskHandle {
            id,
            name: name.to_string(),
            join,
        })
    }

    fn register(&self, name: &str, priority: u8, stack_size: usize) -> Result<Arc<TaskEntry>> {
        let id = TaskId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let entry = Arc::new(TaskEntry::new(id, name, priority, stack_size));
        self.inner
            .entries
            .write()
            .map_err(|e| TelemetryError::Task(format!("Task table lock poisoned: {}", e)))?
            .push(entry.clone());
        Ok(entry)
    }

    /// Microseconds since the table was created.
    pub fn total_runtime(&self) -> u64 {
        self.inner.epoch.elapsed().as_micros() as u64
    }
}

impl SchedulerAccounting for TaskTable {
    fn task_count(&self) -> usize {
        match self.inner.entries.read() {
            Ok(entries) => entries
                .iter()
                .filter(|e| e.alive.load(Ordering::SeqCst))
                .count(),
            Err(_) => 0,
        }
    }

    fn snapshot(&self) -> SystemSnapshot {
        let tasks = match self.inner.entries.read() {
            Ok(entries) => entries
                .iter()
                .filter(|e| e.alive.load(Ordering::SeqCst))
                .map(|e| e.status())
                .collect(),
            Err(e) => {
                tracing::error!("Task table lock poisoned: {}", e);
                Vec::new()
            }
        };
        // Read the total last so no task counter can exceed it
        SystemSnapshot {
            tasks,
            total_runtime: self.total_runtime(),
        }
    }
}

/// Per-thread handle a task uses to account for its own execution.
pub struct TaskContext {
    entry: Arc<TaskEntry>,
    stack_base: usize,
    running_since: Cell<Instant>,
}

#[inline(never)]
fn current_stack_addr() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}

impl TaskContext {
    fn enter(entry: Arc<TaskEntry>) -> Self {
        Self {
            entry,
            stack_base: current_stack_addr(),
            running_since: Cell::new(Instant::now()),
        }
    }

    /// A context that is not registered in any table.
    ///
    /// Stages driven directly by tests (or outside the runtime) still need
    /// somewhere to account their work.
    pub fn detached(name: &str, stack_size: usize) -> Self {
        Self::enter(Arc::new(TaskEntry::new(TaskId(0), name, 0, stack_size)))
    }

    pub fn id(&self) -> TaskId {
        self.entry.id
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    /// Current accounting for this task.
    pub fn status(&self) -> TaskStatus {
        self.entry.status()
    }

    /// Run a call that may block; its duration is not counted as runtime.
    pub fn blocking<R>(&self, f: impl FnOnce() -> R) -> R {
        self.checkpoint();
        let result = f();
        self.running_since.set(Instant::now());
        self.probe_stack();
        result
    }

    /// Fold the time since the last checkpoint into the runtime counter.
    pub fn checkpoint(&self) {
        self.probe_stack();
        let now = Instant::now();
        let busy = now.duration_since(self.running_since.get());
        self.entry
            .runtime_ns
            .fetch_add(busy.as_nanos() as u64, Ordering::Relaxed);
        self.running_since.set(now);
    }

    #[inline(never)]
    fn probe_stack(&self) {
        let depth = self.stack_base.abs_diff(current_stack_addr());
        self.entry.max_stack_depth.fetch_max(depth, Ordering::Relaxed);
    }

    /// Park the calling thread for the rest of the process lifetime.
    pub fn suspend_forever(self) -> ! {
        self.checkpoint();
        tracing::debug!("Task {} suspended", self.name());
        loop {
            thread::park();
        }
    }
}
