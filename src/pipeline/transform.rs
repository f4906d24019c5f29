//! Sample -> command stage.
//!
//! Blocks on the sample channel, applies the [`ControlLaw`] to each sample
//! and forwards the resulting [`ActuatorState`] without blocking. The stage
//! keeps no history: every command depends on its own sample only.

use crate::backend::TaskContext;
use crate::pipeline::channel::{BoundedReceiver, BoundedSender};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::scripting::ControlLaw;
use crate::types::{ActuatorState, Sample};

pub struct TransformStage {
    rx: BoundedReceiver<Sample>,
    tx: BoundedSender<ActuatorState>,
    law: ControlLaw,
    processed: u64,
}

impl TransformStage {
    pub fn new(
        rx: BoundedReceiver<Sample>,
        tx: BoundedSender<ActuatorState>,
        law: ControlLaw,
    ) -> Self {
        Self {
            rx,
            tx,
            law,
            processed: 0,
        }
    }

    pub fn law(&self) -> &ControlLaw {
        &self.law
    }

    /// Samples received so far, forwarded or not.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn apply(&self, sample: Sample) -> PipelineResult<ActuatorState> {
        let command = self
            .law
            .apply(sample)
            .map_err(|e| PipelineError::ControlLaw(e.to_string()))?;
        Ok(ActuatorState { sample, command })
    }

    /// Convert one sample and forward it. Failures are logged here.
    pub fn handle(&mut self, sample: Sample) -> PipelineResult<ActuatorState> {
        self.processed += 1;
        let state = match self.apply(sample) {
            Ok(state) => state,
            Err(e) => {
                tracing::error!("Sample {} dropped: {}", sample, e);
                return Err(e);
            }
        };

        if let Err(e) = self.tx.try_send(state) {
            match e {
                PipelineError::ChannelFull(_) => {
                    tracing::warn!("Dropped state {:?}: {}", state, e)
                }
                _ => tracing::debug!("State {:?} not delivered: {}", state, e),
            }
            return Err(e);
        }
        Ok(state)
    }

    /// Process samples until the sample channel closes.
    pub fn run(&mut self, ctx: &TaskContext) {
        tracing::info!("Transform stage running with law '{}'", self.law.describe());
        loop {
            let sample = match ctx.blocking(|| self.rx.recv()) {
                Ok(sample) => sample,
                Err(e) => {
                    tracing::info!("Transform stage stopping: {}", e);
                    return;
                }
            };
            let _ = self.handle(sample);
            ctx.checkpoint();
        }
    }
}
