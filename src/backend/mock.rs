//! Mock collaborators for running the pipeline without a network or a real
//! scheduler.
//!
//! # Components
//!
//! - [`MockNetwork`] - readiness after a configurable number of polls, records
//!   every datagram, can fail selected send attempts
//! - [`SentLog`] - shared view of what the mock socket sent
//! - [`ScriptedScheduler`] - replays a fixed sequence of snapshots
//!
//! # Example
//!
//! ```ignore
//! use telemetry_pipeline::backend::MockNetwork;
//!
//! let network = MockNetwork::new().up_after(3).fail_attempts([2]);
//! let log = network.sent_log();
//! // ... hand `network` to a TransmitStage ...
//! let datagrams = log.wait_for(10, Duration::from_secs(1));
//! ```

use crate::backend::network::{DatagramSocket, NetworkStack};
use crate::backend::scheduler::{SchedulerAccounting, SystemSnapshot};
use crate::error::Result;
use std::collections::{HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct SentState {
    datagrams: Vec<Vec<u8>>,
    attempts: usize,
}

/// Shared record of datagrams sent through a [`MockNetwork`] socket.
#[derive(Debug, Clone, Default)]
pub struct SentLog {
    state: Arc<(Mutex<SentState>, Condvar)>,
}

impl SentLog {
    /// Datagrams successfully sent so far.
    pub fn datagrams(&self) -> Vec<Vec<u8>> {
        match self.state.0.lock() {
            Ok(s) => s.datagrams.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Send attempts, including the ones that were made to fail.
    pub fn attempts(&self) -> usize {
        self.state.0.lock().map(|s| s.attempts).unwrap_or(0)
    }

    /// Block until `count` attempts have been made or `timeout` elapses,
    /// then return the successful datagrams.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let (lock, cvar) = &*self.state;
        let Ok(mut state) = lock.lock() else {
            return Vec::new();
        };
        while state.attempts < count {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            state = match cvar.wait_timeout(state, deadline - now) {
                Ok((s, _)) => s,
                Err(_) => return Vec::new(),
            };
        }
        state.datagrams.clone()
    }

    fn record(&self, buf: &[u8], fail: &HashSet<usize>) -> std::io::Result<usize> {
        let (lock, cvar) = &*self.state;
        let mut state = lock
            .lock()
            .map_err(|_| std::io::Error::other("sent log poisoned"))?;
        state.attempts += 1;
        let attempt = state.attempts;
        let result = if fail.contains(&attempt) {
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("mock send failure on attempt {}", attempt),
            ))
        } else {
            state.datagrams.push(buf.to_vec());
            Ok(buf.len())
        };
        cvar.notify_all();
        result
    }
}

/// Mock network stack.
#[derive(Debug, Default)]
pub struct MockNetwork {
    up_after: u32,
    polls: Arc<AtomicU32>,
    fail_attempts: HashSet<usize>,
    log: SentLog,
}

impl MockNetwork {
    /// A network that is up on the first poll and never fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report not-ready for the first `polls` readiness checks.
    pub fn up_after(mut self, polls: u32) -> Self {
        self.up_after = polls;
        self
    }

    /// Fail the given 1-based send attempts.
    pub fn fail_attempts(mut self, attempts: impl IntoIterator<Item = usize>) -> Self {
        self.fail_attempts.extend(attempts);
        self
    }

    pub fn sent_log(&self) -> SentLog {
        self.log.clone()
    }

    /// Counter of readiness polls, readable after the network is moved.
    pub fn poll_counter(&self) -> Arc<AtomicU32> {
        self.polls.clone()
    }
}

impl NetworkStack for MockNetwork {
    fn is_up(&mut self) -> bool {
        let polls = self.polls.fetch_add(1, Ordering::SeqCst);
        polls >= self.up_after
    }

    fn open_socket(&mut self, destination: SocketAddr) -> Result<Box<dyn DatagramSocket>> {
        Ok(Box::new(MockSocket {
            destination,
            fail_attempts: self.fail_attempts.clone(),
            log: self.log.clone(),
        }))
    }
}

struct MockSocket {
    destination: SocketAddr,
    fail_attempts: HashSet<usize>,
    log: SentLog,
}

impl DatagramSocket for MockSocket {
    fn send(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.log.record(buf, &self.fail_attempts)
    }

    fn destination(&self) -> SocketAddr {
        self.destination
    }
}

/// Scheduler that replays prepared snapshots, repeating the last one.
#[derive(Debug, Default)]
pub struct ScriptedScheduler {
    snapshots: Mutex<VecDeque<SystemSnapshot>>,
    last: Mutex<SystemSnapshot>,
}

impl ScriptedScheduler {
    pub fn new(snapshots: impl IntoIterator<Item = SystemSnapshot>) -> Self {
        Self {
            snapshots: Mutex::new(snapshots.into_iter().collect()),
            last: Mutex::new(SystemSnapshot::default()),
        }
    }
}

impl SchedulerAccounting for ScriptedScheduler {
    fn task_count(&self) -> usize {
        match self.snapshots.lock() {
            Ok(queue) => match queue.front() {
                Some(next) => next.tasks.len(),
                None => self.last.lock().map(|l| l.tasks.len()).unwrap_or(0),
            },
            Err(_) => 0,
        }
    }

    fn snapshot(&self) -> SystemSnapshot {
        let next = self.snapshots.lock().ok().and_then(|mut q| q.pop_front());
        let Ok(mut last) = self.last.lock() else {
            return SystemSnapshot::default();
        };
        if let Some(next) = next {
            *last = next;
        }
        last.clone()
    }
}
