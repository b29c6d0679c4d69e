// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Runs frames through one filter node between an in-process producer and
//! consumer, then prints the node's buffer counters.
//!
//! ```bash
//! cargo run --example filter_pipeline -- --variant intensity --red 40 --frames 500
//! cargo run --example filter_pipeline -- --variant binop --operator xor --stall-rate 0.3
//! ```

mod common;

use std::{sync::Arc, time::Duration};

use clap::{Parser, ValueEnum};
use framefilter::{
    BufferGroup, ConsumerRole, Destination, FilterNode, FormatDescriptor, Host, LocalRoster,
    LoopbackHost, NodeConfig, ProducerRole, RunState, Source,
};
use framefilter_nodes::{binop, intensity};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Variant {
    Binop,
    Intensity,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OperatorArg {
    And,
    Or,
    Xor,
}

impl From<OperatorArg> for binop::Operator {
    fn from(value: OperatorArg) -> Self {
        match value {
            OperatorArg::And => binop::Operator::And,
            OperatorArg::Or => binop::Operator::Or,
            OperatorArg::Xor => binop::Operator::Xor,
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, about = "Push frames through a filter node")]
struct Args {
    #[arg(long, value_enum, default_value = "binop")]
    variant: Variant,

    /// Number of frames the producer sends.
    #[arg(long, default_value_t = 300)]
    frames: u32,

    /// Capacity of the consumer's delivery queue.
    #[arg(long, default_value_t = 4)]
    queue: usize,

    /// Probability that the consumer skips draining after a frame. Once the
    /// queue is full, further sends fail and the node recycles the buffers.
    #[arg(long, default_value_t = 0.0)]
    stall_rate: f64,

    #[arg(long, value_enum, default_value = "xor")]
    operator: OperatorArg,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    red: f32,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    green: f32,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    blue: f32,

    /// Draw a new random offset for every channel on every frame.
    #[arg(long)]
    randomize: bool,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Node configuration as JSON, e.g. '{"name": "Tint", "preferred": {"width": 64, "height": 48}}'.
    #[arg(long)]
    config: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    common::setup_logging();
    let args = Args::parse();

    let config = match &args.config {
        Some(json) => NodeConfig::from_json(json)?,
        None => NodeConfig::default(),
    };
    if !(0.0..=1.0).contains(&args.stall_rate) {
        return Err("--stall-rate must be within 0..=1".into());
    }

    let (host, deliveries) = LoopbackHost::new(args.queue.max(1));
    let host = Arc::new(host);
    let roster = Arc::new(LocalRoster::new());
    framefilter_nodes::register(&*roster)?;

    let node = match args.variant {
        Variant::Binop => binop::create(
            host.clone(),
            roster.clone(),
            config,
            binop::Settings {
                operator: args.operator.into(),
            },
        )?,
        Variant::Intensity => intensity::create(
            host.clone(),
            roster.clone(),
            config,
            intensity::Settings {
                offsets: [args.red, args.green, args.blue],
                randomize: [args.randomize; 3],
                seed: Some(args.seed),
            },
        )?,
    };

    let format = connect(&node)?;
    let frame_size = format.frame_size().ok_or("negotiated format has no frame size")?;
    info!("Negotiated {}", format);
    info!("Node latency {} us", node.get_latency());

    node.start(0)?;
    while node.run_state() != RunState::Running {
        std::thread::sleep(Duration::from_millis(1));
    }

    let pool = BufferGroup::new(frame_size, args.queue.max(1) + 2);
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut delivered = 0u64;
    let frame_interval_us = (1_000_000.0 / f64::from(format.field_rate.unwrap_or(30.0))) as i64;

    for frame in 0..args.frames {
        let mut buffer = loop {
            if let Some(buffer) = pool.request_buffer() {
                break buffer;
            }
            let delivery = deliveries.recv_timeout(Duration::from_secs(1))?;
            delivery.buffer.recycle();
            delivered += 1;
        };

        for (i, byte) in buffer.payload_mut().iter_mut().enumerate() {
            *byte = (i as u32).wrapping_add(frame) as u8;
        }
        let header = buffer.header_mut();
        header.destination = node.destination();
        header.time_source = host.time_source();
        header.start_time = i64::from(frame) * frame_interval_us;
        node.buffer_received(buffer);

        if !rng.gen_bool(args.stall_rate)
            && let Ok(delivery) = deliveries.try_recv()
        {
            delivery.buffer.recycle();
            delivered += 1;
        }
    }

    node.stop(0)?;
    while let Ok(delivery) = deliveries.recv_timeout(Duration::from_millis(50)) {
        delivery.buffer.recycle();
        delivered += 1;
    }

    let counters = node.stats();
    info!(
        "received={} forwarded={} recycled={} send_failures={} consumed={}",
        counters.received, counters.forwarded, counters.recycled, counters.send_failures, delivered
    );
    if pool.outstanding() != 0 {
        warn!("{} buffers never came back to the pool", pool.outstanding());
    }

    node.shutdown()?;
    Ok(())
}

/// Connects the node's input to a stand-in producer and its output to the
/// loopback consumer, returning the negotiated format.
fn connect(node: &FilterNode) -> framefilter::Result<FormatDescriptor> {
    let mut format = FormatDescriptor::wildcard();
    node.accept_format(node.destination(), &mut format)?;
    node.connected(Source::new(), node.destination(), &format)?;

    let downstream = Destination::new();
    let mut proposed = FormatDescriptor::raw_video();
    node.format_proposal(node.source(), &mut proposed)?;
    let (source, _) = node.prepare_to_connect(node.source(), downstream, &mut proposed)?;
    let mut name = String::new();
    node.connect(Ok(()), source, downstream, &proposed, &mut name);
    info!("Output \"{}\" connected", name);
    Ok(format)
}
