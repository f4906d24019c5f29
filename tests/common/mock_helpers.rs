//! Mock construction helpers

use telemetry_pipeline::backend::{MockNetwork, SentLog};
use telemetry_pipeline::pipeline::{bounded_channel, BoundedReceiver, BoundedSender, CHANNEL_CAPACITY};
use telemetry_pipeline::wire::{decode, WireMessage};
use telemetry_pipeline::{ActuatorState, Sample};

/// Both pipeline channels at their production capacity
pub fn create_pipeline_channels() -> (
    BoundedSender<Sample>,
    BoundedReceiver<Sample>,
    BoundedSender<ActuatorState>,
    BoundedReceiver<ActuatorState>,
) {
    let (adc_tx, adc_rx) = bounded_channel("adc_queue", CHANNEL_CAPACITY);
    let (comms_tx, comms_rx) = bounded_channel("comms_queue", CHANNEL_CAPACITY);
    (adc_tx, adc_rx, comms_tx, comms_rx)
}

/// A network that is up immediately, plus its sent log
pub fn create_test_network() -> (MockNetwork, SentLog) {
    let network = MockNetwork::new();
    let log = network.sent_log();
    (network, log)
}

/// Decode every datagram; panics on a malformed one
pub fn decode_all(datagrams: &[Vec<u8>]) -> Vec<WireMessage> {
    datagrams
        .iter()
        .map(|d| decode(d).expect("transmitted datagram must decode"))
        .collect()
}
