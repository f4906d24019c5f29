//! Fixed-capacity single-producer / single-consumer handoff.
//!
//! Thin wrapper over `crossbeam_channel::bounded` with the pipeline's
//! asymmetric semantics: the producer never blocks (`try_send`, drop on
//! full), the consumer blocks indefinitely. Neither half is `Clone`, so a
//! channel instance has exactly one producer and one consumer.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Capacity of both pipeline hops.
pub const CHANNEL_CAPACITY: usize = 8;

/// Counters shared by both halves of a channel.
#[derive(Debug, Default)]
struct ChannelStats {
    sent: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of a channel's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelCounters {
    pub sent: u64,
    pub dropped: u64,
}

/// Read-only view of a channel's counters, usable from any thread.
#[derive(Debug, Clone)]
pub struct ChannelProbe {
    name: &'static str,
    stats: Arc<ChannelStats>,
}

impl ChannelProbe {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn counters(&self) -> ChannelCounters {
        ChannelCounters {
            sent: self.stats.sent.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Producer half.
pub struct BoundedSender<T> {
    name: &'static str,
    tx: Sender<T>,
    stats: Arc<ChannelStats>,
}

/// Consumer half.
pub struct BoundedReceiver<T> {
    name: &'static str,
    rx: Receiver<T>,
}

/// Create a named channel with a fixed capacity.
pub fn bounded_channel<T>(
    name: &'static str,
    capacity: usize,
) -> (BoundedSender<T>, BoundedReceiver<T>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    let stats = Arc::new(ChannelStats::default());
    (
        BoundedSender { name, tx, stats },
        BoundedReceiver { name, rx },
    )
}

impl<T> BoundedSender<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue without blocking. A full channel drops `item`.
    pub fn try_send(&self, item: T) -> PipelineResult<()> {
        match self.tx.try_send(item) {
            Ok(()) => {
                self.stats.sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(PipelineError::ChannelFull(self.name))
            }
            Err(TrySendError::Disconnected(_)) => Err(PipelineError::ChannelClosed(self.name)),
        }
    }

    pub fn probe(&self) -> ChannelProbe {
        ChannelProbe {
            name: self.name,
            stats: self.stats.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }
}

impl<T> BoundedReceiver<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Block until an item arrives. Fails only once the producer is gone.
    pub fn recv(&self) -> PipelineResult<T> {
        self.rx
            .recv()
            .map_err(|_| PipelineError::ChannelClosed(self.name))
    }

    /// Bounded wait, `Ok(None)` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> PipelineResult<Option<T>> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Ok(Some(item)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(PipelineError::ChannelClosed(self.name)),
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
