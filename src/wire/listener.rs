//! Receive-side decoder for the telemetry stream.
//!
//! Used by the `listen` subcommand to watch what the transmit stage puts on
//! the wire. Every datagram is validated with [`decode`]; malformed ones are
//! reported and skipped. Sequence gaps are counted so that drops upstream of
//! the socket (or on the network) are visible.

use crate::error::{ResultExt, Result};
use crate::wire::codec::{decode, WireMessage, WIRE_MSG_SIZE};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

/// One successfully decoded datagram.
#[derive(Debug, Clone, Serialize)]
pub struct DecodedDatagram {
    pub received_at: DateTime<Local>,
    pub from: SocketAddr,
    #[serde(flatten)]
    pub message: WireMessage,
    /// Messages missing between the previous datagram and this one
    pub gap: u32,
}

/// What happened to a single received datagram.
#[derive(Debug, Clone)]
pub enum ListenEvent {
    Message(DecodedDatagram),
    Malformed { from: SocketAddr, reason: String },
}

/// Tracks the expected next sequence number.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceTracker {
    last: Option<u32>,
    /// Total messages inferred missing
    pub missing: u64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `seqnum` and return how many messages were skipped before it.
    ///
    /// A sequence number that does not move forward (a sender restart or a
    /// reordered datagram) resets tracking instead of counting as a gap.
    pub fn observe(&mut self, seqnum: u32) -> u32 {
        let gap = match self.last {
            Some(last) => {
                let step = seqnum.wrapping_sub(last);
                if step == 0 || step > u32::MAX / 2 {
                    0
                } else {
                    step - 1
                }
            }
            None => 0,
        };
        self.last = Some(seqnum);
        self.missing += gap as u64;
        gap
    }
}

/// UDP listener bound to the telemetry port.
pub struct TelemetryListener {
    socket: UdpSocket,
    tracker: SequenceTracker,
}

impl TelemetryListener {
    /// Bind to `addr` with a read timeout so callers can poll a stop flag.
    pub fn bind(addr: SocketAddr, read_timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(addr).with_context(|| format!("bind {}", addr))?;
        socket
            .set_read_timeout(Some(read_timeout))
            .context("set listener read timeout")?;
        tracing::info!("Listening for telemetry on {}", addr);
        Ok(Self {
            socket,
            tracker: SequenceTracker::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().context("listener address")
    }

    pub fn tracker(&self) -> &SequenceTracker {
        &self.tracker
    }

    /// Wait for one datagram. Returns `Ok(None)` on read timeout.
    pub fn recv(&mut self) -> Result<Option<ListenEvent>> {
        // One spare byte so oversized datagrams are detected as such
        let mut buf = [0u8; WIRE_MSG_SIZE + 1];
        let (len, from) = match self.socket.recv_from(&mut buf) {
            Ok(r) => r,
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                return Ok(None)
            }
            Err(e) => return Err(e).context("receive telemetry datagram"),
        };

        let event = match decode(&buf[..len]) {
            Ok(message) => {
                let gap = self.tracker.observe(message.seqnum);
                if gap > 0 {
                    tracing::warn!("Sequence gap of {} before seqnum {}", gap, message.seqnum);
                }
                ListenEvent::Message(DecodedDatagram {
                    received_at: Local::now(),
                    from,
                    message,
                    gap,
                })
            }
            Err(e) => {
                tracing::warn!("Malformed datagram from {}: {}", from, e);
                ListenEvent::Malformed {
                    from,
                    reason: e.to_string(),
                }
            }
        };
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActuatorState;
    use crate::wire::codec::encode;

    #[test]
    fn test_tracker_counts_gaps() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.observe(1), 0);
        assert_eq!(tracker.observe(2), 0);
        assert_eq!(tracker.observe(5), 2);
        assert_eq!(tracker.missing, 2);
    }

    #[test]
    fn test_tracker_handles_wrap_and_restart() {
        let mut tracker = SequenceTracker::new();
        tracker.observe(u32::MAX);
        assert_eq!(tracker.observe(0), 0);
        assert_eq!(tracker.observe(1), 0);
        // Sender restarted: seqnum went backwards
        assert_eq!(tracker.observe(1), 0);
        assert_eq!(tracker.missing, 0);
    }

    #[test]
    fn test_listener_decodes_loopback_datagram() {
        let mut listener = TelemetryListener::bind(
            "127.0.0.1:0".parse().unwrap(),
            Duration::from_millis(500),
        )
        .unwrap();
        let dest = listener.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let msg = WireMessage::actuator_state(
            7,
            ActuatorState {
                sample: 12,
                command: -12,
            },
        );
        sender.send_to(&encode(&msg), dest).unwrap();
        sender.send_to(&[0xAA, 0xBB], dest).unwrap();

        match listener.recv().unwrap() {
            Some(ListenEvent::Message(d)) => {
                assert_eq!(d.message, msg);
                assert_eq!(d.gap, 0);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match listener.recv().unwrap() {
            Some(ListenEvent::Malformed { reason, .. }) => assert!(reason.contains("got 2")),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
