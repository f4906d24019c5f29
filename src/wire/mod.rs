//! Binary wire format for the telemetry datagram stream.
//!
//! - [`codec`] - pure encode/decode of the fixed 11-byte actuator-state message
//! - [`listener`] - receive-side decoder used by the `listen` subcommand

pub mod codec;
pub mod listener;

pub use codec::{
    decode, encode, MalformedMessage, WireMessage, SENSOR_DATA_PORT, WIRE_MAGIC0, WIRE_MAGIC1,
    WIRE_MSG_SIZE, WIRE_TYPE_ACTUATOR_STATE,
};
pub use listener::{DecodedDatagram, ListenEvent, SequenceTracker, TelemetryListener};
