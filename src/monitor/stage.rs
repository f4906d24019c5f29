//! Periodic runtime statistics poller.

use crate::backend::{SchedulerAccounting, TaskContext};
use crate::monitor::registry::{StackBudgets, StatsRegistry, UtilizationRecord};
use crate::monitor::MonitorError;
use crate::pipeline::PeriodicTimer;
use crossbeam_channel::Sender;
use std::time::Duration;

/// Default polling period.
pub const DEFAULT_MONITOR_PERIOD: Duration = Duration::from_millis(500);

/// Epochs shorter than this many scheduler ticks produce no records.
pub const MIN_TOTAL_DELTA: u64 = 100;

/// Tracing target for utilization records.
pub const STATS_TARGET: &str = "stats";

pub struct MonitorStage {
    scheduler: Box<dyn SchedulerAccounting>,
    registry: StatsRegistry,
    budgets: StackBudgets,
    period: Duration,
    records_tx: Option<Sender<UtilizationRecord>>,
    epochs: u64,
}

impl MonitorStage {
    pub fn new(
        scheduler: Box<dyn SchedulerAccounting>,
        budgets: StackBudgets,
        period: Duration,
    ) -> Self {
        Self {
            scheduler,
            registry: StatsRegistry::new(),
            budgets,
            period,
            records_tx: None,
            epochs: 0,
        }
    }

    /// Also forward every record to `tx`. A full or closed channel is ignored.
    pub fn with_records(mut self, tx: Sender<UtilizationRecord>) -> Self {
        self.records_tx = Some(tx);
        self
    }

    pub fn with_registry(mut self, registry: StatsRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &StatsRegistry {
        &self.registry
    }

    pub fn epochs(&self) -> u64 {
        self.epochs
    }

    /// Run one epoch.
    pub fn poll(&mut self) -> Result<Vec<UtilizationRecord>, MonitorError> {
        let count = self.scheduler.task_count();
        if count > self.registry.capacity() {
            return Err(MonitorError::RegistryCapacityExceeded {
                observed: count,
                capacity: self.registry.capacity(),
            });
        }

        let snapshot = self.scheduler.snapshot();
        let records = self
            .registry
            .record_epoch(&snapshot, &self.budgets, MIN_TOTAL_DELTA)?;
        self.epochs += 1;
        Ok(records)
    }

    fn publish(&self, records: &[UtilizationRecord]) {
        if records.is_empty() {
            return;
        }
        tracing::debug!(target: STATS_TARGET, "Epoch {}: {} task(s)", self.epochs, records.len());
        for record in records {
            tracing::info!(
                target: STATS_TARGET,
                task = %record.name,
                id = record.id,
                runtime = record.delta_runtime,
                cpu_percent = record.cpu_percent(),
                stack_budget = record.stack_budget,
                stack_high_water = record.stack_high_water,
                "{}",
                record
            );
            if let Some(tx) = &self.records_tx {
                let _ = tx.try_send(record.clone());
            }
        }
    }

    /// Poll forever. A monitor error aborts the process.
    pub fn run(&mut self, ctx: &TaskContext) -> ! {
        let mut timer = PeriodicTimer::new(self.period);
        loop {
            if let Err(e) = ctx.blocking(|| timer.wait()) {
                tracing::warn!("Monitor: {}", e);
            }
            match self.poll() {
                Ok(records) => self.publish(&records),
                Err(e) => fatal(e),
            }
            ctx.checkpoint();
        }
    }
}

fn fatal(e: MonitorError) -> ! {
    tracing::error!("Fatal: {}", e);
    std::process::abort()
}
