//! Command -> datagram stage.
//!
//! Waits for the network, opens one socket for the lifetime of the stage,
//! then turns every [`ActuatorState`] into one numbered [`WireMessage`].
//!
//! The sequence counter starts at 0 and is incremented (wrapping) before
//! every message is built, so the first message carries 1. A number is
//! consumed even if the send then fails; the receiver sees that as a gap.

use crate::backend::{DatagramSocket, NetworkStack, TaskContext};
use crate::error::{Result, ResultExt};
use crate::pipeline::channel::BoundedReceiver;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::types::ActuatorState;
use crate::wire::{encode, WireMessage};
use std::net::SocketAddr;
use std::time::Duration;

/// Delay between network readiness polls.
pub const DEFAULT_READY_POLL: Duration = Duration::from_millis(10);

pub struct TransmitStage {
    rx: BoundedReceiver<ActuatorState>,
    network: Box<dyn NetworkStack>,
    destination: SocketAddr,
    ready_poll: Duration,
    socket: Option<Box<dyn DatagramSocket>>,
    seqnum: u32,
    sent: u64,
    failed: u64,
}

impl TransmitStage {
    pub fn new(
        rx: BoundedReceiver<ActuatorState>,
        network: Box<dyn NetworkStack>,
        destination: SocketAddr,
    ) -> Self {
        Self {
            rx,
            network,
            destination,
            ready_poll: DEFAULT_READY_POLL,
            socket: None,
            seqnum: 0,
            sent: 0,
            failed: 0,
        }
    }

    pub fn with_ready_poll(mut self, ready_poll: Duration) -> Self {
        self.ready_poll = ready_poll;
        self
    }

    /// Start the counter somewhere other than 0.
    pub fn with_seqnum(mut self, seqnum: u32) -> Self {
        self.seqnum = seqnum;
        self
    }

    /// Last sequence number issued (0 before the first message).
    pub fn seqnum(&self) -> u32 {
        self.seqnum
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Poll readiness until the network is up. Returns the number of polls.
    pub fn wait_for_network(&mut self, ctx: &TaskContext) -> u32 {
        let mut polls = 1;
        while !self.network.is_up() {
            ctx.blocking(|| std::thread::sleep(self.ready_poll));
            polls += 1;
        }
        tracing::info!("Network up after {} poll(s)", polls);
        polls
    }

    /// Open the telemetry socket.
    pub fn open(&mut self) -> Result<()> {
        let socket = self
            .network
            .open_socket(self.destination)
            .with_context(|| format!("open telemetry socket to {}", self.destination))?;
        tracing::info!("Telemetry socket open, sending to {}", socket.destination());
        self.socket = Some(socket);
        Ok(())
    }

    /// Number, encode and send one state.
    pub fn transmit(&mut self, state: ActuatorState) -> PipelineResult<WireMessage> {
        let Some(socket) = self.socket.as_mut() else {
            return Err(PipelineError::TransmitFailed("socket not open".to_string()));
        };

        self.seqnum = self.seqnum.wrapping_add(1);
        let msg = WireMessage::actuator_state(self.seqnum, state);
        let buf = encode(&msg);

        match socket.send(&buf) {
            Ok(_) => {
                self.sent += 1;
                tracing::trace!("Sent seq {} ({}, {})", msg.seqnum, msg.sample, msg.command);
                Ok(msg)
            }
            Err(e) => {
                self.failed += 1;
                Err(PipelineError::TransmitFailed(format!(
                    "seq {}: {}",
                    msg.seqnum, e
                )))
            }
        }
    }

    /// Bring the link up, then send until the command channel closes.
    ///
    /// Only a failure to open the socket is returned.
    pub fn run(&mut self, ctx: &TaskContext) -> Result<()> {
        self.wait_for_network(ctx);
        self.open()?;
        ctx.checkpoint();

        loop {
            let state = match ctx.blocking(|| self.rx.recv()) {
                Ok(state) => state,
                Err(e) => {
                    tracing::info!("Transmit stage stopping after seq {}: {}", self.seqnum, e);
                    return Ok(());
                }
            };
            if let Err(e) = self.transmit(state) {
                tracing::error!("{}", e);
            }
            ctx.checkpoint();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::network::{MockDatagramSocket, MockNetworkStack};
    use crate::backend::MockNetwork;
    use crate::error::TelemetryError;
    use crate::pipeline::channel::{bounded_channel, CHANNEL_CAPACITY};
    use crate::wire::{decode, WIRE_MAGIC0, WIRE_MAGIC1, WIRE_TYPE_ACTUATOR_STATE};
    use mockall::predicate::*;
    use mockall::Sequence;

    fn dest() -> SocketAddr {
        "127.0.0.1:9889".parse().unwrap()
    }

    fn state(sample: i16) -> ActuatorState {
        ActuatorState {
            sample,
            command: sample.saturating_neg(),
        }
    }

    #[test]
    fn test_first_message_has_seq_one() {
        let (_tx, rx) = bounded_channel("comms_queue", CHANNEL_CAPACITY);
        let network = MockNetwork::new();
        let log = network.sent_log();
        let mut stage = TransmitStage::new(rx, Box::new(network), dest());
        stage.open().unwrap();

        let msg = stage.transmit(state(-128)).unwrap();
        assert_eq!(msg.seqnum, 1);
        assert_eq!(msg.sample, -128);
        assert_eq!(msg.command, 128);
        assert_eq!(msg.magic0, WIRE_MAGIC0);
        assert_eq!(msg.magic1, WIRE_MAGIC1);
        assert_eq!(msg.msg_type, WIRE_TYPE_ACTUATOR_STATE);

        let datagrams = log.datagrams();
        assert_eq!(datagrams.len(), 1);
        assert_eq!(decode(&datagrams[0]).unwrap(), msg);
    }

    #[test]
    fn test_failed_send_consumes_sequence_number() {
        let (_tx, rx) = bounded_channel("comms_queue", CHANNEL_CAPACITY);
        let network = MockNetwork::new().fail_attempts([2]);
        let log = network.sent_log();
        let mut stage = TransmitStage::new(rx, Box::new(network), dest());
        stage.open().unwrap();

        assert!(stage.transmit(state(1)).is_ok());
        assert!(matches!(
            stage.transmit(state(2)),
            Err(PipelineError::TransmitFailed(_))
        ));
        assert_eq!(stage.transmit(state(3)).unwrap().seqnum, 3);

        let seqs: Vec<u32> = log
            .datagrams()
            .iter()
            .map(|d| decode(d).unwrap().seqnum)
            .collect();
        assert_eq!(seqs, vec![1, 3]);
        assert_eq!(stage.sent(), 2);
        assert_eq!(stage.failed(), 1);
    }

    #[test]
    fn test_sequence_wraps() {
        let (_tx, rx) = bounded_channel("comms_queue", CHANNEL_CAPACITY);
        let mut stage =
            TransmitStage::new(rx, Box::new(MockNetwork::new()), dest()).with_seqnum(u32::MAX);
        stage.open().unwrap();
        assert_eq!(stage.transmit(state(0)).unwrap().seqnum, 0);
        assert_eq!(stage.transmit(state(0)).unwrap().seqnum, 1);
    }

    #[test]
    fn test_transmit_without_socket() {
        let (_tx, rx) = bounded_channel("comms_queue", CHANNEL_CAPACITY);
        let mut stage = TransmitStage::new(rx, Box::new(MockNetwork::new()), dest());
        assert!(stage.transmit(state(0)).is_err());
        assert_eq!(stage.seqnum(), 0);
    }

    #[test]
    fn test_waits_for_readiness_then_opens_once() {
        let mut seq = Sequence::new();
        let mut network = MockNetworkStack::new();
        network
            .expect_is_up()
            .times(3)
            .in_sequence(&mut seq)
            .returning(|| false);
        network
            .expect_is_up()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| true);
        network
            .expect_open_socket()
            .with(eq(dest()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|d| {
                let mut socket = MockDatagramSocket::new();
                socket.expect_destination().return_const(d);
                socket.expect_send().times(2).returning(|buf| Ok(buf.len()));
                Ok(Box::new(socket) as Box<dyn DatagramSocket>)
            });

        let (tx, rx) = bounded_channel("comms_queue", CHANNEL_CAPACITY);
        tx.try_send(state(7)).unwrap();
        tx.try_send(state(8)).unwrap();
        drop(tx);

        let mut stage = TransmitStage::new(rx, Box::new(network), dest())
            .with_ready_poll(Duration::from_millis(1));
        let ctx = TaskContext::detached("Comms", 64 * 1024);
        stage.run(&ctx).unwrap();
        assert_eq!(stage.seqnum(), 2);
    }

    #[test]
    fn test_open_failure_is_returned() {
        let mut network = MockNetworkStack::new();
        network.expect_is_up().returning(|| true);
        network
            .expect_open_socket()
            .returning(|_| Err(TelemetryError::Network("no route".into())));

        let (_tx, rx) = bounded_channel("comms_queue", CHANNEL_CAPACITY);
        let mut stage = TransmitStage::new(rx, Box::new(network), dest());
        let ctx = TaskContext::detached("Comms", 64 * 1024);
        let err = stage.run(&ctx).unwrap_err();
        assert!(err.to_string().contains("no route"));
    }
}
