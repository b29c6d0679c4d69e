// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Latency bookkeeping.
//!
//! A node reports `downstream + processing + scheduling` upstream. The
//! downstream part comes from the consumer, the processing part is measured
//! by running the transform once on a blank frame when the output connects,
//! and the scheduling part is a configured constant.

use std::time::Instant;

use tracing::{debug, warn};

use crate::{
    buffer::BufferGroup,
    format::FormatDescriptor,
    params::ParameterStore,
    transform::Transform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyTracker {
    downstream_us: i64,
    processing_us: i64,
    scheduling_us: i64,
}

impl LatencyTracker {
    pub fn new(scheduling_us: i64) -> Self {
        Self {
            downstream_us: 0,
            processing_us: 0,
            scheduling_us,
        }
    }

    pub fn downstream(&self) -> i64 {
        self.downstream_us
    }

    pub fn processing(&self) -> i64 {
        self.processing_us
    }

    pub fn scheduling(&self) -> i64 {
        self.scheduling_us
    }

    /// Latency of one event through this node: downstream plus processing.
    pub fn event_latency(&self) -> i64 {
        self.downstream_us + self.processing_us
    }

    /// The value reported to upstream producers.
    pub fn total(&self) -> i64 {
        self.event_latency() + self.scheduling_us
    }

    pub fn set_downstream(&mut self, latency_us: i64) {
        self.downstream_us = latency_us;
    }

    pub fn set_processing(&mut self, latency_us: i64) {
        self.processing_us = latency_us;
    }
}

/// Times one pass of `transform` over a zeroed frame of `format`.
///
/// The transform is initialized for `format` afterwards so the blank frame
/// does not leak into its history. Returns 0 if the format has no frame size.
pub fn measure_processing_latency(
    format: &FormatDescriptor,
    transform: &mut dyn Transform,
    params: &ParameterStore,
) -> i64 {
    let Some(frame_size) = format.frame_size() else {
        warn!("Cannot measure processing latency without a frame size");
        transform.init(format);
        return 0;
    };
    let group = BufferGroup::new(frame_size, 1);
    let Some(mut buffer) = group.request_buffer() else {
        transform.init(format);
        return 0;
    };

    let mut snapshot = params.snapshot();
    let started = Instant::now();
    transform.filter(buffer.payload_mut(), &mut snapshot);
    let elapsed = i64::try_from(started.elapsed().as_micros()).unwrap_or(i64::MAX);

    buffer.recycle();
    transform.init(format);
    debug!("Measured processing latency: {} us for {} bytes", elapsed, frame_size);
    elapsed
}
