//! Platform collaborators for the telemetry pipeline.
//!
//! The pipeline stages and the monitor only see traits defined here, so the
//! same stage code runs on the hosted runtime and against test doubles.
//!
//! # Components
//!
//! - [`SchedulerAccounting`] - consistent snapshots of task runtime and stack use
//! - [`TaskTable`] - hosted scheduler: named threads with runtime accounting
//! - [`NetworkStack`] / [`DatagramSocket`] - readiness polling and one UDP socket
//! - [`UdpNetwork`] - real UDP over `std::net`
//! - [`MockNetwork`] / [`ScriptedScheduler`] - deterministic doubles for tests
//!
//! # Example
//!
//! ```ignore
//! use telemetry_pipeline::backend::{SchedulerAccounting, TaskTable};
//!
//! let table = TaskTable::new();
//! let handle = table.spawn("Worker", 1, 128 * 1024, |ctx| {
//!     ctx.checkpoint();
//! })?;
//! handle.join();
//! let snapshot = table.snapshot();
//! ```

pub mod mock;
pub mod network;
pub mod scheduler;
pub mod task_table;
pub mod udp;

pub use mock::{MockNetwork, ScriptedScheduler, SentLog};
pub use network::{DatagramSocket, NetworkStack};
pub use scheduler::{SchedulerAccounting, SystemSnapshot, TaskId, TaskStatus};
pub use task_table::{TaskContext, TaskHandle, TaskTable};
pub use udp::{subnet_broadcast, UdpLink, UdpNetwork};
