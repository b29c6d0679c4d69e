// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! A node wired between a test producer and a loopback consumer.

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::Receiver;
use framefilter::{
    BufferGroup, ConsumerRole, Delivery, Destination, FilterNode, FormatDescriptor, Host,
    LocalRoster, LoopbackHost, NodeConfig, PreferredFormat, ProducerRole, Result, Roster,
    RunState, Source,
};

/// 4x2 RGB32, eight words per frame.
pub(crate) fn small_config() -> NodeConfig {
    NodeConfig {
        preferred: PreferredFormat {
            width: 4,
            height: 2,
            field_rate: 30.0,
        },
        ..NodeConfig::default()
    }
}

pub(crate) struct NodeHarness {
    pub host: Arc<LoopbackHost>,
    pub deliveries: Receiver<Delivery>,
    pub node: FilterNode,
    pool: BufferGroup,
}

impl NodeHarness {
    /// Builds a node with `build`, connects both sides and starts it.
    pub fn running(
        build: impl FnOnce(Arc<dyn Host>, Arc<dyn Roster>) -> Result<FilterNode>,
    ) -> Self {
        let (host, deliveries) = LoopbackHost::new(8);
        let host = Arc::new(host);
        let node = build(host.clone(), Arc::new(LocalRoster::new())).unwrap();

        let mut format = FormatDescriptor::wildcard();
        node.accept_format(node.destination(), &mut format).unwrap();
        node.connected(Source::new(), node.destination(), &format)
            .unwrap();

        let downstream = Destination::new();
        let mut output_format = FormatDescriptor::raw_video();
        let (source, _) = node
            .prepare_to_connect(node.source(), downstream, &mut output_format)
            .unwrap();
        let mut name = String::new();
        node.connect(Ok(()), source, downstream, &output_format, &mut name);

        node.start(0).unwrap();
        wait_for(|| node.run_state() == RunState::Running);

        let pool = BufferGroup::new(format.frame_size().unwrap(), 4);
        Self {
            host,
            deliveries,
            node,
            pool,
        }
    }

    /// Sends one frame of little-endian words through the node and returns
    /// the words delivered downstream.
    pub fn push(&self, words: &[u32]) -> Vec<u32> {
        let mut buffer = self.pool.request_buffer().unwrap();
        for (chunk, word) in buffer.payload_mut().chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        let header = buffer.header_mut();
        header.destination = self.node.destination();
        header.time_source = self.host.time_source();

        self.node.buffer_received(buffer);

        let delivery = self
            .deliveries
            .recv_timeout(Duration::from_secs(1))
            .unwrap();
        let out = words_of(delivery.buffer.payload());
        delivery.buffer.recycle();
        out
    }
}

pub(crate) fn words_of(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect()
}

pub(crate) fn wait_for(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}
