//! Integration tests for the three-stage pipeline
//!
//! These tests run the real stages on task threads against the mock network:
//! - A full sine waveform end to end
//! - Drop-on-full behaviour with a stalled consumer
//! - Sequence numbering across failed sends

mod common;

use common::mock_helpers::{create_pipeline_channels, create_test_network, decode_all};
use common::{fast_period, test_timeout};
use std::time::Duration;
use telemetry_pipeline::backend::{MockNetwork, TaskContext, TaskTable};
use telemetry_pipeline::pipeline::{
    SamplerState, SamplingStage, TransformStage, TransmitStage, Waveform, SINE_WAVE,
};
use telemetry_pipeline::wire::{WIRE_MAGIC0, WIRE_MAGIC1, WIRE_TYPE_ACTUATOR_STATE};
use telemetry_pipeline::{ControlLaw, Sample};

fn dest() -> std::net::SocketAddr {
    "127.0.0.1:9889".parse().unwrap()
}

#[test]
fn test_sine_waveform_end_to_end() {
    let (adc_tx, adc_rx, comms_tx, comms_rx) = create_pipeline_channels();
    let adc_probe = adc_tx.probe();
    let comms_probe = comms_tx.probe();
    let network = MockNetwork::new().up_after(3);
    let log = network.sent_log();
    let polls = network.poll_counter();

    let table = TaskTable::new();
    let sensor = table
        .spawn("Sensor", 4, 256 * 1024, move |ctx| {
            let mut stage =
                SamplingStage::new(Waveform::sine(), adc_tx, Duration::from_millis(1));
            stage.run(&ctx);
            assert_eq!(stage.state(), SamplerState::Suspended);
        })
        .unwrap();
    let actuator = table
        .spawn("Actuator", 4, 256 * 1024, move |ctx| {
            TransformStage::new(adc_rx, comms_tx, ControlLaw::Invert).run(&ctx)
        })
        .unwrap();
    let comms = table
        .spawn("Comms", 4, 256 * 1024, move |ctx| {
            let mut stage = TransmitStage::new(comms_rx, Box::new(network), dest())
                .with_ready_poll(Duration::from_millis(1));
            stage.run(&ctx).unwrap();
        })
        .unwrap();

    assert!(sensor.join());
    assert!(actuator.join());
    assert!(comms.join());
    assert!(polls.load(std::sync::atomic::Ordering::SeqCst) >= 4);

    let dropped = adc_probe.counters().dropped + comms_probe.counters().dropped;
    let msgs = decode_all(&log.datagrams());
    assert_eq!(msgs.len() as u64, 256 - dropped);

    // Numbering is dense from 1 over what was actually sent
    for (i, m) in msgs.iter().enumerate() {
        assert_eq!(m.seqnum, i as u32 + 1);
        assert_eq!(m.magic0, WIRE_MAGIC0);
        assert_eq!(m.magic1, WIRE_MAGIC1);
        assert_eq!(m.msg_type, WIRE_TYPE_ACTUATOR_STATE);
        assert_eq!(m.command, m.sample.saturating_neg());
    }

    // Samples arrive in table order, as a subsequence when anything dropped
    let table_samples: Vec<Sample> = SINE_WAVE.iter().map(|&b| b as i8 as Sample).collect();
    let mut it = table_samples.iter();
    for m in &msgs {
        assert!(it.any(|&s| s == m.sample), "sample {} out of order", m.sample);
    }

    if dropped == 0 {
        assert_eq!((msgs[0].sample, msgs[0].command), (-128, 128));
        let last = msgs.last().unwrap();
        assert_eq!((last.sample, last.command, last.seqnum), (125, -125, 256));
    }
}

#[test]
fn test_overrun_never_blocks_producer() {
    let (adc_tx, adc_rx, _comms_tx, _comms_rx) = create_pipeline_channels();
    let probe = adc_tx.probe();
    let samples: Vec<Sample> = (0..20).collect();
    let mut stage = SamplingStage::new(Waveform::from_samples(samples), adc_tx, fast_period());

    // Consumer stalled: every tick returns immediately
    stage.start();
    let start = std::time::Instant::now();
    while stage.tick().is_some() {}
    assert!(start.elapsed() < test_timeout());

    assert_eq!(stage.state(), SamplerState::Suspended);
    assert_eq!(probe.counters().sent, 8);
    assert_eq!(probe.counters().dropped, 12);

    let got: Vec<Sample> = (0..8).map(|_| adc_rx.recv().unwrap()).collect();
    assert_eq!(got, (0..8).collect::<Vec<_>>());
    assert!(adc_rx.is_empty());
}

#[test]
fn test_failed_sends_leave_sequence_gaps() {
    let (_adc_tx, _adc_rx, comms_tx, comms_rx) = create_pipeline_channels();
    let network = MockNetwork::new().fail_attempts([3, 4]);
    let log = network.sent_log();

    for s in 1..=6 {
        comms_tx
            .try_send(telemetry_pipeline::ActuatorState {
                sample: s,
                command: -s,
            })
            .unwrap();
    }
    drop(comms_tx);

    let mut stage = TransmitStage::new(comms_rx, Box::new(network), dest());
    let ctx = TaskContext::detached("Comms", 256 * 1024);
    stage.run(&ctx).unwrap();

    let seqs: Vec<u32> = decode_all(&log.wait_for(6, test_timeout()))
        .iter()
        .map(|m| m.seqnum)
        .collect();
    assert_eq!(seqs, vec![1, 2, 5, 6]);
    assert_eq!(stage.seqnum(), 6);
    assert_eq!(stage.failed(), 2);
}

#[test]
fn test_script_law_through_pipeline() {
    let (adc_tx, adc_rx, comms_tx, comms_rx) = create_pipeline_channels();
    let (network, log) = create_test_network();
    let law = ControlLaw::from_source(Some("-sample / 2")).unwrap();

    for s in [100, -100, 7] {
        adc_tx.try_send(s).unwrap();
    }
    drop(adc_tx);

    let ctx = TaskContext::detached("Actuator", 256 * 1024);
    TransformStage::new(adc_rx, comms_tx, law).run(&ctx);

    let mut transmit = TransmitStage::new(comms_rx, Box::new(network), dest());
    transmit.run(&ctx).unwrap();

    let pairs: Vec<(i16, i16)> = decode_all(&log.datagrams())
        .iter()
        .map(|m| (m.sample, m.command))
        .collect();
    assert_eq!(pairs, vec![(100, -50), (-100, 50), (7, -3)]);
}
