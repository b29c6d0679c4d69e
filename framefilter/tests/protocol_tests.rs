// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Protocol-level tests for a filter node driven through its role traits.
//!
//! Each test builds a node on top of a [`LoopbackHost`], whose bounded
//! delivery queue stands in for the downstream consumer. A full queue makes
//! `send_buffer` fail, which is how send failures are induced.
//!
//! # Test Coverage
//!
//! - Input negotiation and the two-phase output connect
//! - Latency reporting on connect and on downstream changes
//! - Buffer ownership over randomized deliveries
//! - Lifecycle events, offline mode and parameter scheduling
//! - Forwarding of control messages upstream and downstream

use std::{
    collections::HashSet,
    sync::{Arc, Barrier, Mutex},
    thread,
    time::{Duration, Instant},
};

use framefilter::{
    Buffer, BufferGroup, ConsumerRole, ControllableRole, DataStatus, Delivery, Destination, Error,
    FilterNode, FormatDescriptor, HostMessage, LinkState, LocalRoster, LoopbackHost, MediaKind,
    NodeConfig, Orientation, ParamId, ParameterSnapshot, ParameterSpec, ParameterValue,
    PixelLayout, ProducerRole, RunMode, RunState, Source, StoppedBufferPolicy, Transform,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing_test::traced_test;

const FRAME_BYTES: usize = 64;
const GAIN: ParamId = ParamId(0);

/// Adds the gain parameter to every byte, so filtered frames are recognisable.
struct AddGain;

impl Transform for AddGain {
    fn filter(&mut self, frame: &mut [u8], params: &mut ParameterSnapshot) {
        let gain = params.discrete(GAIN).unwrap_or(0) as u8;
        for byte in frame {
            *byte = byte.wrapping_add(gain);
        }
    }
}

struct Harness {
    host: Arc<LoopbackHost>,
    deliveries: crossbeam_channel::Receiver<Delivery>,
    roster: Arc<LocalRoster>,
    node: FilterNode,
}

/// Signals each frame it starts on, then holds on to it for a while.
struct SlowFrames {
    entered: crossbeam_channel::Sender<()>,
    lifecycle: Arc<Mutex<Vec<&'static str>>>,
}

impl Transform for SlowFrames {
    fn start(&mut self) {
        self.lifecycle.lock().unwrap().push("start");
    }

    fn stop(&mut self) {
        self.lifecycle.lock().unwrap().push("stop");
    }

    fn filter(&mut self, _frame: &mut [u8], _params: &mut ParameterSnapshot) {
        let _ = self.entered.send(());
        thread::sleep(Duration::from_millis(600));
    }
}

impl Harness {
    fn new(queue: usize, config: NodeConfig) -> Self {
        Self::with_transform(queue, config, AddGain)
    }

    fn with_transform(queue: usize, config: NodeConfig, transform: impl Transform + 'static) -> Self {
        let (host, deliveries) = LoopbackHost::new(queue);
        let host = Arc::new(host);
        let roster = Arc::new(LocalRoster::new());
        let node = FilterNode::builder(host.clone(), roster.clone())
            .config(config)
            .parameters(vec![ParameterSpec::discrete(GAIN, "Gain", &[], 1)])
            .build(transform)
            .unwrap();
        Self {
            host,
            deliveries,
            roster,
            node,
        }
    }

    fn connect_input(&self) -> (Source, FormatDescriptor) {
        let mut format = FormatDescriptor::wildcard();
        self.node
            .accept_format(self.node.destination(), &mut format)
            .unwrap();
        let upstream = Source::new();
        self.node
            .connected(upstream, self.node.destination(), &format)
            .unwrap();
        (upstream, format)
    }

    fn connect_output(&self) -> Destination {
        let downstream = Destination::new();
        let mut format = FormatDescriptor::raw_video();
        let (source, _) = self
            .node
            .prepare_to_connect(self.node.source(), downstream, &mut format)
            .unwrap();
        let mut name = String::new();
        self.node
            .connect(Ok(()), source, downstream, &format, &mut name);
        assert_eq!(name, "Video Output");
        downstream
    }

    fn start(&self) {
        self.node.start(0).unwrap();
        wait_for(|| self.node.run_state() == RunState::Running);
    }

    fn buffer(&self, pool: &BufferGroup, start_time: i64) -> Buffer {
        let mut buffer = pool.request_buffer().unwrap();
        buffer.payload_mut().fill(0);
        let header = buffer.header_mut();
        header.destination = self.node.destination();
        header.time_source = framefilter::Host::time_source(&*self.host);
        header.start_time = start_time;
        buffer
    }
}

fn wait_for(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn all_wildcard_input_proposal_gets_the_default_format() {
    let harness = Harness::new(4, NodeConfig::default());
    let (_, format) = harness.connect_input();

    assert!(format.is_concrete());
    assert_eq!(format.kind, Some(MediaKind::RawVideo));
    assert_eq!(format.pixel_layout, Some(PixelLayout::Rgb32));
    assert_eq!(format.width, Some(320));
    assert_eq!(format.height, Some(240));
    assert_eq!(format.row_stride, Some(1280));
    assert_eq!(format.last_active, Some(239));
    assert_eq!(format.orientation, Some(Orientation::TopLeftRight));
    assert_eq!(harness.node.input_state(), LinkState::Connected);
    assert_eq!(harness.node.working_format(), format);
}

#[test]
fn accept_format_for_a_foreign_destination_is_rejected() {
    let harness = Harness::new(4, NodeConfig::default());
    let mut format = FormatDescriptor::wildcard();
    assert!(matches!(
        harness.node.accept_format(Destination::new(), &mut format),
        Err(Error::BadDestination)
    ));
    assert_eq!(format, FormatDescriptor::wildcard());
}

#[test]
fn output_is_bound_exactly_after_a_successful_two_phase_connect() {
    let harness = Harness::new(4, NodeConfig::default());
    let node = &harness.node;
    let source = node.source();
    let mut rng = StdRng::seed_from_u64(7);

    // Model: the destination the output should be bound to, if any.
    let mut bound: Option<Destination> = None;
    let mut pending: Option<Destination> = None;

    for _ in 0..2_000 {
        match rng.gen_range(0..5) {
            0 => {
                let destination = Destination::new();
                let mut format = FormatDescriptor::raw_video();
                let result = node.prepare_to_connect(source, destination, &mut format);
                if bound.is_none() && pending.is_none() {
                    assert!(result.is_ok());
                    pending = Some(destination);
                } else {
                    assert!(matches!(result, Err(Error::AlreadyConnected)));
                }
            }
            1 | 2 => {
                let Some(destination) = pending.take() else {
                    continue;
                };
                let succeed = rng.gen_bool(0.5);
                let status = if succeed {
                    Ok(())
                } else {
                    Err(Error::Other("refused".to_owned()))
                };
                let mut name = String::new();
                node.connect(
                    status,
                    source,
                    destination,
                    &node.output().format,
                    &mut name,
                );
                if succeed {
                    bound = Some(destination);
                }
            }
            3 => {
                if let Some(destination) = bound.take() {
                    node.disconnect(source, destination);
                }
            }
            _ => {
                // Spurious teardown for a link that does not exist.
                node.disconnect(source, Destination::new());
            }
        }

        match (bound, pending) {
            (Some(destination), _) => {
                assert_eq!(node.output_state(), LinkState::Connected);
                assert_eq!(node.output().peer, destination);
            }
            (None, Some(destination)) => {
                assert_eq!(node.output_state(), LinkState::PendingOutput);
                assert_eq!(node.output().peer, destination);
            }
            (None, None) => assert_eq!(node.output_state(), LinkState::Unconnected),
        }
    }
}

#[test]
fn concurrent_prepare_to_connect_has_a_single_winner() {
    let harness = Arc::new(Harness::new(4, NodeConfig::default()));
    let contenders = 8;
    let barrier = Arc::new(Barrier::new(contenders));

    let handles: Vec<_> = (0..contenders)
        .map(|_| {
            let harness = harness.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let mut format = FormatDescriptor::raw_video();
                barrier.wait();
                harness
                    .node
                    .prepare_to_connect(harness.node.source(), Destination::new(), &mut format)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(Error::AlreadyConnected)))
    );
    assert_eq!(harness.node.output_state(), LinkState::PendingOutput);
}

#[test]
fn latency_reports_stay_consistent() {
    let harness = Harness::new(4, NodeConfig::default());
    harness.host.set_downstream_latency(10_000);
    let (upstream, _) = harness.connect_input();
    let downstream = harness.connect_output();
    let node = &harness.node;

    let latency = node.latency();
    assert_eq!(latency.downstream(), 10_000);
    assert_eq!(node.get_latency(), latency.event_latency() + latency.scheduling());
    let (for_input, time_source) = node.get_latency_for(node.destination()).unwrap();
    assert_eq!(for_input, latency.downstream() + latency.processing());
    assert_eq!(time_source, framefilter::Host::time_source(&*harness.host));

    let messages = harness.host.take_messages();
    assert_eq!(
        messages,
        vec![HostMessage::LatencyChange {
            source: upstream,
            destination: node.destination(),
            latency_us: node.get_latency(),
        }]
    );

    node.latency_changed(node.source(), downstream, 25_000);
    assert_eq!(node.latency().downstream(), 25_000);
    assert_eq!(
        harness.host.take_messages(),
        vec![HostMessage::LatencyChange {
            source: upstream,
            destination: node.destination(),
            latency_us: 25_000 + latency.processing() + latency.scheduling(),
        }]
    );

    // Not our link: nothing changes, nothing is sent.
    node.latency_changed(node.source(), Destination::new(), 1);
    assert_eq!(node.latency().downstream(), 25_000);
    assert!(harness.host.take_messages().is_empty());

    assert!(matches!(
        node.get_latency_for(Destination::new()),
        Err(Error::BadDestination)
    ));
}

#[test]
fn latency_change_without_an_established_output_is_ignored() {
    let harness = Harness::new(4, NodeConfig::default());
    harness.connect_input();
    harness.host.take_messages();
    let node = &harness.node;
    let before = node.latency();

    node.latency_changed(node.source(), Destination::null(), 99_999);
    assert_eq!(node.latency(), before);
    assert!(harness.host.take_messages().is_empty());

    // Reserved but not yet established.
    let downstream = Destination::new();
    let mut format = FormatDescriptor::raw_video();
    node.prepare_to_connect(node.source(), downstream, &mut format)
        .unwrap();
    node.latency_changed(node.source(), downstream, 99_999);
    assert_eq!(node.latency(), before);
    assert!(harness.host.take_messages().is_empty());
}

#[test]
fn output_connect_without_input_sends_no_latency() {
    let harness = Harness::new(4, NodeConfig::default());
    harness.connect_output();
    assert!(harness.host.messages().is_empty());
    assert!(harness.node.working_format().is_concrete());
}

#[test]
fn randomized_deliveries_hand_off_every_buffer_exactly_once() {
    let deliveries = 10_000;
    let queue = 16;
    let harness = Harness::new(queue, NodeConfig::default());
    harness.connect_input();
    let downstream = harness.connect_output();
    harness.start();
    let node = &harness.node;

    let pool = BufferGroup::new(FRAME_BYTES, deliveries);
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut forwarded = HashSet::new();
    let mut expected_recycled = 0;
    let mut expected_failures = 0;
    let mut enabled = true;

    for i in 0..deliveries {
        if rng.gen_bool(0.02) {
            enabled = !enabled;
            node.enable_output(node.source(), enabled);
        }
        // The consumer drains at its own pace, so the queue sometimes fills.
        while !harness.deliveries.is_empty() && rng.gen_bool(0.45) {
            let delivery = harness.deliveries.recv().unwrap();
            assert_eq!(delivery.destination, downstream);
            assert!(delivery.buffer.payload().iter().all(|b| *b == 1));
            assert!(forwarded.insert(delivery.buffer.id()));
            delivery.buffer.recycle();
        }

        let mut buffer = harness.buffer(&pool, i as i64);
        let misaddressed = rng.gen_bool(0.05);
        if misaddressed {
            buffer.header_mut().destination = Destination::new();
        }

        let queue_full = harness.deliveries.len() == queue;
        if misaddressed || !enabled {
            expected_recycled += 1;
        } else if queue_full {
            expected_recycled += 1;
            expected_failures += 1;
        }
        node.buffer_received(buffer);
    }

    for delivery in harness.deliveries.try_iter() {
        assert!(forwarded.insert(delivery.buffer.id()));
        delivery.buffer.recycle();
    }

    let stats = node.stats();
    assert_eq!(stats.received, deliveries as u64);
    assert_eq!(stats.recycled, expected_recycled);
    assert_eq!(stats.send_failures, expected_failures);
    assert_eq!(stats.forwarded, forwarded.len() as u64);
    assert_eq!(stats.forwarded + stats.recycled, deliveries as u64);
    assert_eq!(pool.outstanding(), 0);
    assert_eq!(pool.recycled(), deliveries as u64);
}

#[test]
fn concurrent_delivery_and_control_never_lose_a_buffer() {
    let deliveries_per_thread = 1_000;
    let producers = 4;
    let harness = Arc::new(Harness::new(8, NodeConfig::default()));
    harness.connect_input();
    harness.connect_output();
    harness.start();

    let pool = BufferGroup::new(FRAME_BYTES, producers * deliveries_per_thread);
    let consumer = {
        let deliveries = harness.deliveries.clone();
        thread::spawn(move || {
            let mut received = 0u64;
            while let Ok(delivery) = deliveries.recv_timeout(Duration::from_millis(500)) {
                delivery.buffer.recycle();
                received += 1;
            }
            received
        })
    };
    let controller = {
        let harness = harness.clone();
        thread::spawn(move || {
            for i in 0..200 {
                harness.node.enable_output(harness.node.source(), i % 2 == 0);
                harness
                    .node
                    .set_parameter_value(GAIN, i, &(i as u32 % 3).to_le_bytes());
            }
            harness.node.enable_output(harness.node.source(), true);
        })
    };
    let producers: Vec<_> = (0..producers)
        .map(|_| {
            let harness = harness.clone();
            let pool = pool.clone();
            thread::spawn(move || {
                for i in 0..deliveries_per_thread {
                    let buffer = harness.buffer(&pool, i as i64);
                    harness.node.buffer_received(buffer);
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    controller.join().unwrap();
    let mut received = consumer.join().unwrap();
    for delivery in harness.deliveries.try_iter() {
        delivery.buffer.recycle();
        received += 1;
    }

    let stats = harness.node.stats();
    assert_eq!(stats.received, pool.recycled());
    assert_eq!(stats.forwarded, received);
    assert_eq!(stats.forwarded + stats.recycled, stats.received);
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn stopped_node_recycles_or_bypasses() {
    let harness = Harness::new(4, NodeConfig::default());
    harness.connect_input();
    harness.connect_output();
    let pool = BufferGroup::new(FRAME_BYTES, 4);

    // Never started: recycled.
    harness.node.buffer_received(harness.buffer(&pool, 0));
    assert!(harness.deliveries.is_empty());
    assert_eq!(pool.outstanding(), 0);

    harness.start();
    harness.node.buffer_received(harness.buffer(&pool, 1));
    let delivery = harness.deliveries.try_recv().unwrap();
    assert!(delivery.buffer.payload().iter().all(|b| *b == 1));
    delivery.buffer.recycle();

    harness.node.stop(0).unwrap();
    wait_for(|| harness.node.run_state() == RunState::Idle);
    harness.node.buffer_received(harness.buffer(&pool, 2));
    assert!(harness.deliveries.is_empty());
    assert_eq!(harness.node.stats().recycled, 2);

    let config = NodeConfig {
        stopped_buffers: StoppedBufferPolicy::Bypass,
        ..NodeConfig::default()
    };
    let bypass = Harness::new(4, config);
    bypass.connect_input();
    bypass.connect_output();
    bypass.node.buffer_received(bypass.buffer(&pool, 3));
    let delivery = bypass.deliveries.try_recv().unwrap();
    assert!(delivery.buffer.payload().iter().all(|b| *b == 0));
    delivery.buffer.recycle();
}

#[test]
#[traced_test]
fn foreign_time_source_is_logged_and_the_buffer_still_filtered() {
    let harness = Harness::new(4, NodeConfig::default());
    harness.connect_input();
    harness.connect_output();
    harness.start();
    assert_eq!(harness.node.run_mode(), RunMode::DecreasePrecision);

    let pool = BufferGroup::new(FRAME_BYTES, 2);
    let mut buffer = harness.buffer(&pool, 0);
    buffer.header_mut().time_source = framefilter::TimeSourceId::new();
    harness.node.buffer_received(buffer);

    assert!(logs_contain("foreign time source"));
    let delivery = harness.deliveries.try_recv().unwrap();
    assert!(delivery.buffer.payload().iter().all(|b| *b == 1));
    delivery.buffer.recycle();
    assert_eq!(harness.node.stats().forwarded, 1);
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn control_events_are_not_held_up_by_a_frame_in_flight() {
    let (entered_tx, entered) = crossbeam_channel::unbounded();
    let lifecycle = Arc::new(Mutex::new(Vec::new()));
    let harness = Harness::with_transform(
        4,
        NodeConfig::default(),
        SlowFrames {
            entered: entered_tx,
            lifecycle: lifecycle.clone(),
        },
    );
    harness.connect_input();
    harness.connect_output();
    harness.start();
    // The latency warm-up pass already ran one frame.
    while entered.try_recv().is_ok() {}

    let pool = BufferGroup::new(FRAME_BYTES, 2);
    thread::scope(|scope| {
        scope.spawn(|| harness.node.buffer_received(harness.buffer(&pool, 1)));
        entered.recv_timeout(Duration::from_secs(5)).unwrap();

        let sent = Instant::now();
        harness.node.stop(0).unwrap();
        harness.node.seek(42, 0).unwrap();
        wait_for(|| harness.node.timeline().last_seek.is_some());
        assert!(
            sent.elapsed() < Duration::from_millis(300),
            "seek dispatched after {:?}",
            sent.elapsed()
        );
        assert_eq!(harness.node.run_state(), RunState::Idle);
    });

    let delivery = harness.deliveries.try_recv().unwrap();
    delivery.buffer.recycle();
    assert_eq!(*lifecycle.lock().unwrap(), vec!["start"]);

    harness.node.shutdown().unwrap();
    assert_eq!(*lifecycle.lock().unwrap(), vec!["start", "stop"]);
}

#[test]
fn offline_mode_tracks_buffer_time_and_requests_more() {
    let config = NodeConfig {
        run_mode: RunMode::Offline,
        ..NodeConfig::default()
    };
    let harness = Harness::new(4, config);
    let (upstream, _) = harness.connect_input();
    harness.connect_output();
    harness.start();
    harness.host.take_messages();

    let pool = BufferGroup::new(FRAME_BYTES, 2);
    let mut buffer = harness.buffer(&pool, 40_000);
    // Offline buffers may carry any time source.
    buffer.header_mut().time_source = framefilter::TimeSourceId::new();
    harness.node.buffer_received(buffer);
    assert_eq!(harness.node.offline_time(), 40_000);

    let delivery = harness.deliveries.try_recv().unwrap();
    harness
        .node
        .additional_buffer_requested(harness.node.source(), delivery.buffer.id(), 40_000);
    delivery.buffer.recycle();
    assert_eq!(
        harness.host.take_messages(),
        vec![HostMessage::BufferRequest {
            source: upstream,
            offline_time: 40_000,
        }]
    );

    harness.node.set_run_mode(RunMode::DecreasePrecision);
    harness.node.buffer_received(harness.buffer(&pool, 80_000));
    assert_eq!(harness.node.offline_time(), 40_000);
}

#[test]
fn scheduled_parameter_change_applies_with_its_time() {
    let harness = Harness::new(4, NodeConfig::default());
    let changes = harness.node.subscribe_parameters();

    harness
        .node
        .schedule_parameter(GAIN, ParameterValue::Discrete(9), 0)
        .unwrap();
    let change = changes.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(change.id, GAIN);
    assert_eq!(change.value, ParameterValue::Discrete(9));
    assert_eq!(
        harness.node.get_parameter_value(GAIN).unwrap(),
        (0, ParameterValue::Discrete(9))
    );
    assert!(matches!(
        harness.node.get_parameter_value(ParamId(99)),
        Err(Error::UnknownParameter(ParamId(99)))
    ));
}

#[test]
fn seek_and_time_warp_are_recorded() {
    let harness = Harness::new(4, NodeConfig::default());
    harness.node.seek(1_000_000, 0).unwrap();
    harness.node.time_warp(2_000_000, 0).unwrap();
    wait_for(|| harness.node.timeline().last_warp.is_some());
    let timeline = harness.node.timeline();
    assert_eq!(timeline.last_seek, Some((1_000_000, 0)));
    assert_eq!(timeline.last_warp, Some((2_000_000, 0)));
}

#[test]
fn buffer_group_and_data_status_are_routed() {
    let harness = Harness::new(4, NodeConfig::default());
    let node = &harness.node;
    assert!(matches!(
        node.set_buffer_group(node.source(), Some(BufferGroup::new(1280 * 240, 2))),
        Err(Error::NoProducer)
    ));
    assert!(matches!(
        node.set_buffer_group(Source::new(), None),
        Err(Error::BadSource)
    ));

    let (upstream, _) = harness.connect_input();
    node.set_buffer_group(node.source(), Some(BufferGroup::new(1280 * 240, 2)))
        .unwrap();

    // Output unbound: status is swallowed.
    node.producer_data_status(node.destination(), DataStatus::Available, 5);
    let downstream = harness.connect_output();
    harness.host.take_messages();
    node.producer_data_status(node.destination(), DataStatus::ProducerStopped, 6);

    assert_eq!(
        harness.host.take_messages(),
        vec![HostMessage::DataStatus {
            status: DataStatus::ProducerStopped,
            destination: downstream,
            when: 6,
        }]
    );
    assert!(matches!(
        harness.node.set_buffer_group(node.source(), None),
        Ok(())
    ));
    assert!(harness.host.messages().contains(&HostMessage::OutputBuffers {
        source: upstream,
        destination: node.destination(),
        buffer_size: None,
    }));
}

#[test]
#[traced_test]
fn late_notice_without_input_has_no_one_to_blame() {
    let harness = Harness::new(4, NodeConfig::default());
    harness
        .node
        .late_notice_received(harness.node.source(), 3_000, 10);
    assert!(logs_contain("no input to blame"));
    assert!(harness.host.messages().is_empty());

    let (upstream, _) = harness.connect_input();
    harness
        .node
        .late_notice_received(harness.node.source(), 3_000, 10);
    assert_eq!(
        harness.host.messages(),
        vec![HostMessage::LateNotice {
            source: upstream,
            how_late_us: 3_000,
            when: 10,
        }]
    );
}

#[test]
fn format_requests_follow_the_working_format() {
    let harness = Harness::new(4, NodeConfig::default());
    let node = &harness.node;
    let (upstream, input_format) = harness.connect_input();

    let mut suggestion = FormatDescriptor::wildcard();
    node.format_suggestion_requested(MediaKind::RawVideo, 0, &mut suggestion)
        .unwrap();
    assert_eq!(suggestion, input_format);
    assert!(matches!(
        node.format_suggestion_requested(MediaKind::RawAudio, 0, &mut suggestion),
        Err(Error::BadFormat)
    ));

    let mut proposal = FormatDescriptor::raw_video();
    node.format_proposal(node.source(), &mut proposal).unwrap();
    assert_eq!(proposal, input_format);

    let mut wrong_size = FormatDescriptor {
        width: Some(640),
        ..FormatDescriptor::raw_video()
    };
    assert!(matches!(
        node.prepare_to_connect(node.source(), Destination::new(), &mut wrong_size),
        Err(Error::BadFormat)
    ));

    let mut change = input_format.clone();
    assert!(matches!(
        node.format_change_requested(node.source(), Destination::new(), &mut change),
        Err(Error::BadFormat)
    ));
    assert!(matches!(
        node.format_changed(upstream, node.destination(), &input_format),
        Err(Error::BadFormat)
    ));
    assert!(matches!(
        node.set_play_rate(2, 1),
        Err(Error::Unsupported(_))
    ));
}

#[test]
fn endpoints_enumerate_once() {
    let harness = Harness::new(4, NodeConfig::default());
    let mut cookie = 0;
    let input = harness.node.get_next_input(&mut cookie).unwrap();
    assert_eq!(input.local, harness.node.destination());
    assert!(matches!(
        harness.node.get_next_input(&mut cookie),
        Err(Error::BadIndex)
    ));

    let mut cookie = 0;
    assert_eq!(
        harness.node.get_next_output(&mut cookie).unwrap().local,
        harness.node.source()
    );
    assert!(matches!(
        harness.node.get_next_output(&mut cookie),
        Err(Error::BadIndex)
    ));
}

#[test]
fn disconnecting_both_sides_resets_the_working_format() {
    let harness = Harness::new(4, NodeConfig::default());
    let (upstream, _) = harness.connect_input();
    let downstream = harness.connect_output();
    let node = &harness.node;

    node.disconnected(Source::new(), node.destination());
    assert_eq!(node.input_state(), LinkState::Connected);

    node.disconnected(upstream, node.destination());
    assert!(node.working_format().is_concrete());
    node.disconnect(node.source(), downstream);
    assert!(node.working_format().is_wildcard());
    assert_eq!(node.output_state(), LinkState::Unconnected);
}

#[test]
fn shutdown_unregisters_and_stops_the_control_thread() {
    let harness = Harness::new(4, NodeConfig::default());
    let id = harness.node.id();
    assert!(harness.roster.contains(id));

    harness.node.shutdown().unwrap();
    assert!(!harness.roster.contains(id));
    assert_eq!(harness.node.run_state(), RunState::Stopped);
    assert!(matches!(harness.node.start(0), Err(Error::Scheduler(_))));
    harness.node.shutdown().unwrap();
}
