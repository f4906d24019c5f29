//! Field-by-field encoder/decoder for the actuator-state datagram.
//!
//! The layout is fixed and carries no padding:
//!
//! ```text
//! offset  width  field
//!      0      1  magic0   (0xAA)
//!      1      1  magic1   (0xBB)
//!      2      1  type     (0xF0, actuator state)
//!      3      4  seqnum   (u32, little-endian)
//!      7      2  sample   (i16, little-endian)
//!      9      2  command  (i16, little-endian)
//! ```

use crate::types::{ActuatorState, Command, Sample};
use serde::Serialize;
use thiserror::Error;

/// UDP port the telemetry stream is sent to.
pub const SENSOR_DATA_PORT: u16 = 9889;

pub const WIRE_MAGIC0: u8 = 0xAA;
pub const WIRE_MAGIC1: u8 = 0xBB;

/// Type tag for the actuator/telemetry state message.
pub const WIRE_TYPE_ACTUATOR_STATE: u8 = 0xF0;

const MAGIC0_WIDTH: usize = 1;
const MAGIC1_WIDTH: usize = 1;
const TYPE_WIDTH: usize = 1;
const SEQNUM_WIDTH: usize = 4;
const SAMPLE_WIDTH: usize = 2;
const COMMAND_WIDTH: usize = 2;

/// Encoded size of one wire message.
pub const WIRE_MSG_SIZE: usize = 11;

const _: () = assert!(
    MAGIC0_WIDTH + MAGIC1_WIDTH + TYPE_WIDTH + SEQNUM_WIDTH + SAMPLE_WIDTH + COMMAND_WIDTH
        == WIRE_MSG_SIZE
);

const SEQNUM_OFFSET: usize = MAGIC0_WIDTH + MAGIC1_WIDTH + TYPE_WIDTH;
const SAMPLE_OFFSET: usize = SEQNUM_OFFSET + SEQNUM_WIDTH;
const COMMAND_OFFSET: usize = SAMPLE_OFFSET + SAMPLE_WIDTH;

/// Decoded view of one telemetry datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WireMessage {
    pub magic0: u8,
    pub magic1: u8,
    pub msg_type: u8,
    /// Starts at 1
    pub seqnum: u32,
    pub sample: Sample,
    pub command: Command,
}

impl WireMessage {
    /// Build an actuator-state message with the constant header fields.
    pub fn actuator_state(seqnum: u32, state: ActuatorState) -> Self {
        Self {
            magic0: WIRE_MAGIC0,
            magic1: WIRE_MAGIC1,
            msg_type: WIRE_TYPE_ACTUATOR_STATE,
            seqnum,
            sample: state.sample,
            command: state.command,
        }
    }

    /// The `{sample, command}` pair carried by this message.
    pub fn state(&self) -> ActuatorState {
        ActuatorState {
            sample: self.sample,
            command: self.command,
        }
    }
}

/// Why a buffer was rejected by [`decode`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedMessage {
    #[error("expected {expected} bytes, got {0}", expected = WIRE_MSG_SIZE)]
    Length(usize),

    #[error("bad magic 0x{0:02X} 0x{1:02X}")]
    Magic(u8, u8),

    #[error("unknown message type 0x{0:02X}")]
    Type(u8),
}

/// Serialize a message into its fixed-size byte form.
pub fn encode(msg: &WireMessage) -> [u8; WIRE_MSG_SIZE] {
    let mut buf = [0u8; WIRE_MSG_SIZE];
    buf[0] = msg.magic0;
    buf[1] = msg.magic1;
    buf[2] = msg.msg_type;
    buf[SEQNUM_OFFSET..SAMPLE_OFFSET].copy_from_slice(&msg.seqnum.to_le_bytes());
    buf[SAMPLE_OFFSET..COMMAND_OFFSET].copy_from_slice(&msg.sample.to_le_bytes());
    buf[COMMAND_OFFSET..].copy_from_slice(&msg.command.to_le_bytes());
    buf
}

/// Parse and validate a datagram.
///
/// Length is checked first, then the magic bytes, then the type tag. No
/// field of a rejected buffer is ever surfaced.
pub fn decode(buf: &[u8]) -> Result<WireMessage, MalformedMessage> {
    let buf: &[u8; WIRE_MSG_SIZE] = buf
        .try_into()
        .map_err(|_| MalformedMessage::Length(buf.len()))?;

    if buf[0] != WIRE_MAGIC0 || buf[1] != WIRE_MAGIC1 {
        return Err(MalformedMessage::Magic(buf[0], buf[1]));
    }
    if buf[2] != WIRE_TYPE_ACTUATOR_STATE {
        return Err(MalformedMessage::Type(buf[2]));
    }

    let seqnum = u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]);
    let sample = i16::from_le_bytes([buf[7], buf[8]]);
    let command = i16::from_le_bytes([buf[9], buf[10]]);

    Ok(WireMessage {
        magic0: buf[0],
        magic1: buf[1],
        msg_type: buf[2],
        seqnum,
        sample,
        command,
    })
}
