//! Absolute-deadline periodic wait.
//!
//! Each deadline is the previous deadline plus the period, never "now plus
//! the period", so processing time inside the loop does not accumulate as
//! drift. A deadline that has already passed when [`PeriodicTimer::wait`] is
//! called returns immediately with [`PipelineError::DeadlineMissed`]; the
//! schedule itself is left untouched.

use crate::pipeline::error::{PipelineError, PipelineResult};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PeriodicTimer {
    period: Duration,
    next_wake: Instant,
}

impl PeriodicTimer {
    /// Start a timer whose first deadline is one period from now.
    pub fn new(period: Duration) -> Self {
        Self::starting_at(Instant::now(), period)
    }

    pub fn starting_at(start: Instant, period: Duration) -> Self {
        Self {
            period,
            next_wake: start,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// The deadline the next call to [`wait`](Self::wait) will sleep until.
    pub fn next_deadline(&self) -> Instant {
        self.next_wake + self.period
    }

    /// Sleep until the next deadline.
    pub fn wait(&mut self) -> PipelineResult<()> {
        self.next_wake += self.period;
        let now = Instant::now();
        if now >= self.next_wake {
            return Err(PipelineError::DeadlineMissed {
                late: now - self.next_wake,
            });
        }
        std::thread::sleep(self.next_wake - now);
        Ok(())
    }
}
