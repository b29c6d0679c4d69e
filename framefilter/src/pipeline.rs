// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! The per-buffer fast path.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, trace, warn};

use crate::{
    Error,
    buffer::Buffer,
    config::{RunMode, StoppedBufferPolicy},
    host::SendFailure,
    node::{NodeCore, RunState, lock},
};

/// Why a buffer went back to its pool instead of downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecycleReason {
    /// Addressed to a destination other than this node's input.
    BadDestination,
    /// Output not connected, or disabled.
    OutputUnavailable,
    NotRunning,
    /// The host refused the buffer.
    SendFailed,
}

/// What happened to a received buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Forwarded,
    Recycled(RecycleReason),
}

#[derive(Debug, Default)]
pub(crate) struct PipelineStats {
    received: AtomicU64,
    forwarded: AtomicU64,
    recycled: AtomicU64,
    send_failures: AtomicU64,
}

/// Buffer counts of a node since it was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineCounters {
    pub received: u64,
    pub forwarded: u64,
    pub recycled: u64,
    pub send_failures: u64,
}

impl PipelineStats {
    pub(crate) fn counters(&self) -> PipelineCounters {
        PipelineCounters {
            received: self.received.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            recycled: self.recycled.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }
}

impl NodeCore {
    /// Filters `buffer` and hands it downstream, or recycles it.
    ///
    /// Every buffer leaves through exactly one of the two paths.
    pub(crate) fn process_buffer(&self, mut buffer: Buffer) -> Disposition {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let (own_input, downstream, enabled) = {
            let state = lock(&self.state);
            (state.input().local, state.downstream(), state.output_enabled())
        };

        if buffer.header().destination != own_input {
            debug!(
                "{}: buffer {} addressed to {}, not to this input",
                self.config.name,
                buffer.id(),
                buffer.header().destination
            );
            return self.recycle(buffer, RecycleReason::BadDestination);
        }

        let run_mode = self.run_mode();
        if run_mode != RunMode::Offline && buffer.header().time_source != self.host.time_source() {
            warn!(
                "{}: buffer {} stamped against foreign time source {}",
                self.config.name,
                buffer.id(),
                buffer.header().time_source
            );
        }

        let Some((source, destination)) = downstream.filter(|_| enabled) else {
            trace!("{}: output unavailable, recycling buffer {}", self.config.name, buffer.id());
            return self.recycle(buffer, RecycleReason::OutputUnavailable);
        };

        match (self.run_state(), self.config.stopped_buffers) {
            (RunState::Running, _) => self.filter(&mut buffer),
            (_, StoppedBufferPolicy::Bypass) => {
                lock(&self.transform).sync(false);
                trace!("{}: not running, bypassing buffer {}", self.config.name, buffer.id());
            }
            (_, StoppedBufferPolicy::Recycle) => {
                return self.recycle(buffer, RecycleReason::NotRunning);
            }
        }

        let start_time = buffer.header().start_time;
        let disposition = match self.host.send_buffer(buffer, source, destination) {
            Ok(()) => {
                self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
                Disposition::Forwarded
            }
            Err(SendFailure { buffer, code }) => {
                error!(
                    "{}: failed to send buffer {}: {}",
                    self.config.name,
                    buffer.id(),
                    Error::SendFailed(code)
                );
                self.stats.send_failures.fetch_add(1, Ordering::Relaxed);
                self.recycle(buffer, RecycleReason::SendFailed)
            }
        };

        if run_mode == RunMode::Offline {
            self.offline_time.store(start_time, Ordering::Release);
        }
        disposition
    }

    fn filter(&self, buffer: &mut Buffer) {
        let mut snapshot = self.params.snapshot();
        let mut slot = lock(&self.transform);
        slot.sync(true);
        slot.transform().filter(buffer.payload_mut(), &mut snapshot);
        drop(slot);
        self.params.absorb(snapshot);
    }

    fn recycle(&self, buffer: Buffer, reason: RecycleReason) -> Disposition {
        buffer.recycle();
        self.stats.recycled.fetch_add(1, Ordering::Relaxed);
        Disposition::Recycled(reason)
    }
}
