//! Periodic producer over a finite waveform.
//!
//! Lifecycle is `Init -> Reading -> Suspended`. Every period the stage takes
//! the next waveform entry and offers it to the sample channel without
//! blocking. Once the waveform is exhausted the stage is suspended for good.

use crate::backend::TaskContext;
use crate::pipeline::channel::BoundedSender;
use crate::pipeline::error::PipelineError;
use crate::pipeline::timer::PeriodicTimer;
use crate::pipeline::waveform::Waveform;
use crate::types::Sample;
use std::time::Duration;

/// Default sampling period.
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Init,
    Reading,
    /// Terminal; no further samples are produced
    Suspended,
}

pub struct SamplingStage {
    waveform: Waveform,
    tx: BoundedSender<Sample>,
    period: Duration,
    timer: Option<PeriodicTimer>,
    state: SamplerState,
    index: usize,
    produced: u64,
    dropped: u64,
    missed_deadlines: u64,
}

impl SamplingStage {
    pub fn new(waveform: Waveform, tx: BoundedSender<Sample>, period: Duration) -> Self {
        Self {
            waveform,
            tx,
            period,
            timer: None,
            state: SamplerState::Init,
            index: 0,
            produced: 0,
            dropped: 0,
            missed_deadlines: 0,
        }
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    /// Samples accepted by the channel.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Samples dropped because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn missed_deadlines(&self) -> u64 {
        self.missed_deadlines
    }

    /// Leave `Init` and anchor the periodic schedule at the current instant.
    pub fn start(&mut self) {
        if self.state != SamplerState::Init {
            return;
        }
        self.timer = Some(PeriodicTimer::new(self.period));
        self.state = if self.waveform.is_empty() {
            SamplerState::Suspended
        } else {
            SamplerState::Reading
        };
        tracing::info!(
            "Sampling {} entries every {:?}",
            self.waveform.len(),
            self.period
        );
    }

    /// Emit the next sample. Returns the sample taken, if any.
    ///
    /// The sample is consumed from the waveform whether or not the channel
    /// accepted it.
    pub fn tick(&mut self) -> Option<Sample> {
        if self.state != SamplerState::Reading {
            return None;
        }
        let sample = self.waveform.get(self.index)?;
        self.index += 1;

        match self.tx.try_send(sample) {
            Ok(()) => self.produced += 1,
            Err(e @ PipelineError::ChannelFull(_)) => {
                self.dropped += 1;
                tracing::warn!("Dropped sample {}: {}", sample, e);
            }
            Err(e) => tracing::debug!("Sample {} not delivered: {}", sample, e),
        }

        if self.index >= self.waveform.len() {
            self.state = SamplerState::Suspended;
            tracing::info!(
                "Waveform exhausted after {} samples ({} dropped), suspending",
                self.index,
                self.dropped
            );
        }
        Some(sample)
    }

    /// Drive the stage until the waveform is exhausted.
    pub fn run(&mut self, ctx: &TaskContext) {
        self.start();
        while self.state == SamplerState::Reading {
            let Some(timer) = self.timer.as_mut() else {
                break;
            };
            if let Err(e) = ctx.blocking(|| timer.wait()) {
                self.missed_deadlines += 1;
                tracing::warn!("Sampling: {}", e);
            }
            self.tick();
            ctx.checkpoint();
        }
    }
}
