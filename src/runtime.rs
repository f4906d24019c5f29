//! Hosted runtime: wires the channels and spawns the fixed task set.
//!
//! ```text
//! Sensor --adc_queue--> Actuator --comms_queue--> Comms --> UDP
//! Stats (independent)
//! ```
//!
//! Every task runs on its own [`TaskTable`] thread with the priority and
//! stack budget of its [`TaskKind`]. The monitor reads the same table.

use crate::backend::{NetworkStack, TaskHandle, TaskTable, UdpNetwork};
use crate::config::{AppConfig, WaveformSource};
use crate::error::{Result, ResultExt};
use crate::monitor::{MonitorStage, StackBudgets, UtilizationRecord};
use crate::pipeline::{
    bounded_channel, ChannelProbe, SamplingStage, TransformStage, TransmitStage, Waveform,
    CHANNEL_CAPACITY,
};
use crate::scripting::ControlLaw;
use crate::types::{ActuatorState, Sample, TaskKind};
use crossbeam_channel::Receiver;

/// Name of the sample channel.
pub const ADC_QUEUE: &str = "adc_queue";

/// Name of the actuator-state channel.
pub const COMMS_QUEUE: &str = "comms_queue";

/// Capacity of the channel that exposes utilization records.
const RECORD_BACKLOG: usize = 64;

#[derive(Debug)]
pub struct Runtime {
    table: TaskTable,
    handles: Vec<TaskHandle>,
    probes: [ChannelProbe; 2],
    records: Receiver<UtilizationRecord>,
}

impl Runtime {
    /// Start the pipeline on the host's UDP stack.
    pub fn start(config: &AppConfig) -> Result<Self> {
        let network = UdpNetwork::new(config.network.local_ip);
        Self::start_with(config, Box::new(network))
    }

    /// Start the pipeline on an arbitrary network collaborator.
    pub fn start_with(config: &AppConfig, network: Box<dyn NetworkStack>) -> Result<Self> {
        config.validate()?;

        let law = ControlLaw::from_source(config.transform.script.as_deref())
            .context("Failed to load control law")?;
        let waveform = match &config.sampling.waveform {
            WaveformSource::Sine => Waveform::sine(),
            WaveformSource::Samples(samples) => Waveform::from_samples(samples.clone()),
        };
        let budgets =
            StackBudgets::from_task_kinds().with_overrides(&config.monitor.stack_budgets);
        let destination = config.destination_addr();

        let (adc_tx, adc_rx) = bounded_channel::<Sample>(ADC_QUEUE, CHANNEL_CAPACITY);
        let (comms_tx, comms_rx) = bounded_channel::<ActuatorState>(COMMS_QUEUE, CHANNEL_CAPACITY);
        let probes = [adc_tx.probe(), comms_tx.probe()];
        let (records_tx, records) = crossbeam_channel::bounded(RECORD_BACKLOG);

        let table = TaskTable::new();
        let mut handles = Vec::with_capacity(TaskKind::ALL.len());

        let mut sampler = SamplingStage::new(waveform, adc_tx, config.sampling.period());
        handles.push(spawn(&table, TaskKind::Sensor, move |ctx| {
            sampler.run(&ctx);
            ctx.suspend_forever()
        })?);

        let mut transform = TransformStage::new(adc_rx, comms_tx, law);
        handles.push(spawn(&table, TaskKind::Actuator, move |ctx| {
            transform.run(&ctx)
        })?);

        let mut transmit = TransmitStage::new(comms_rx, network, destination)
            .with_ready_poll(config.network.ready_poll());
        handles.push(spawn(&table, TaskKind::Comms, move |ctx| {
            if let Err(e) = transmit.run(&ctx) {
                tracing::error!("Fatal: {}", e);
                std::process::abort();
            }
        })?);

        let mut monitor =
            MonitorStage::new(Box::new(table.clone()), budgets, config.monitor.period())
                .with_records(records_tx);
        handles.push(spawn(&table, TaskKind::Stats, move |ctx| monitor.run(&ctx))?);

        tracing::info!(
            "Runtime started: {} tasks, telemetry to {}",
            handles.len(),
            destination
        );

        Ok(Self {
            table,
            handles,
            probes,
            records,
        })
    }

    pub fn table(&self) -> &TaskTable {
        &self.table
    }

    pub fn handles(&self) -> &[TaskHandle] {
        &self.handles
    }

    /// Drop counters of both channels, sample channel first.
    pub fn channel_probes(&self) -> &[ChannelProbe; 2] {
        &self.probes
    }

    /// Utilization records published by the monitor.
    pub fn records(&self) -> &Receiver<UtilizationRecord> {
        &self.records
    }

    /// Block until every task has returned. The tasks normally never do.
    pub fn join(self) -> bool {
        let mut clean = true;
        for handle in self.handles {
            let name = handle.name.clone();
            if !handle.join() {
                tracing::error!("Task {} panicked", name);
                clean = false;
            }
        }
        clean
    }
}

fn spawn<F>(table: &TaskTable, kind: TaskKind, f: F) -> Result<TaskHandle>
where
    F: FnOnce(crate::backend::TaskContext) + Send + 'static,
{
    table.spawn(kind.name(), kind.priority(), kind.stack_size(), f)
}
