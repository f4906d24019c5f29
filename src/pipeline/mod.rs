//! Three-stage producer/consumer pipeline.
//!
//! Samples flow from a periodic producer through a stateless transform to
//! the datagram transmitter. Each hop is a bounded SPSC channel of capacity
//! [`CHANNEL_CAPACITY`].
//!
//! # Architecture
//!
//! ```text
//! [SamplingStage] --adc_queue--> [TransformStage] --comms_queue--> [TransmitStage] --> UDP
//! ```
//!
//! # Design
//!
//! - **Producers never block** - `try_send`, a full channel drops the item.
//! - **Consumers block** - receive has no timeout; it only fails once the
//!   producer is gone.
//! - **No error crosses a channel** - each stage logs its own conditions.
//! - **Absolute-deadline timing** - see [`PeriodicTimer`].

pub mod channel;
pub mod error;
pub mod sampling;
pub mod timer;
pub mod transform;
pub mod transmit;
pub mod waveform;

pub use channel::{
    bounded_channel, BoundedReceiver, BoundedSender, ChannelCounters, ChannelProbe,
    CHANNEL_CAPACITY,
};
pub use error::{PipelineError, PipelineResult};
pub use sampling::{SamplerState, SamplingStage, DEFAULT_SAMPLE_PERIOD};
pub use timer::PeriodicTimer;
pub use transform::TransformStage;
pub use transmit::{TransmitStage, DEFAULT_READY_POLL};
pub use waveform::{Waveform, SINE_WAVE};
