// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! The outbound side of a node: everything it asks of the media host.

use std::sync::{
    Mutex,
    atomic::{AtomicI64, Ordering},
};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{error, trace};

use crate::{
    Result,
    buffer::{Buffer, BufferGroup},
    endpoint::{Destination, Source, TimeSourceId},
};

/// Producer data status forwarded downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStatus {
    Available,
    NotAvailable,
    ProducerStopped,
}

/// A buffer the host refused, handed back so the sender can recycle it.
#[derive(Debug)]
pub struct SendFailure {
    pub buffer: Buffer,
    /// Host status code, opaque to the node.
    pub code: i32,
}

/// Services a filter node uses to reach its peers and the host clock.
///
/// Implementations must be callable from any thread. Nodes never call into
/// the host while holding their own locks.
pub trait Host: Send + Sync {
    /// The time source this node's performance times refer to.
    fn time_source(&self) -> TimeSourceId;

    /// Hands a buffer to `destination`. Ownership moves on success.
    fn send_buffer(
        &self,
        buffer: Buffer,
        source: Source,
        destination: Destination,
    ) -> std::result::Result<(), SendFailure>;

    fn send_data_status(
        &self,
        status: DataStatus,
        destination: Destination,
        when: i64,
    ) -> Result<()>;

    /// Tells the upstream producer feeding `destination` about a new latency.
    fn send_latency_change(
        &self,
        source: Source,
        destination: Destination,
        latency_us: i64,
    ) -> Result<()>;

    /// Forwards a late notice to the producer behind `source`.
    fn notify_late_producer(&self, source: Source, how_late_us: i64, when: i64) -> Result<()>;

    /// Asks the downstream consumer at `destination` for its latency.
    fn find_latency_for(&self, source: Source, destination: Destination) -> Result<(i64, TimeSourceId)>;

    /// Asks the upstream producer to send one more buffer.
    fn request_additional_buffer(&self, source: Source, offline_time: i64) -> Result<()>;

    /// Asks the producer behind `source` to allocate from `group`,
    /// or from its own pool when `group` is `None`.
    fn set_output_buffers_for(
        &self,
        source: Source,
        destination: Destination,
        group: Option<BufferGroup>,
    ) -> Result<()>;
}

/// Status code returned by [`LoopbackHost`] when the delivery queue is full.
pub const QUEUE_FULL: i32 = -1;
/// Status code returned by [`LoopbackHost`] when nobody consumes deliveries.
pub const NO_CONSUMER: i32 = -2;

/// A control message recorded by [`LoopbackHost`].
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    DataStatus {
        status: DataStatus,
        destination: Destination,
        when: i64,
    },
    LatencyChange {
        source: Source,
        destination: Destination,
        latency_us: i64,
    },
    LateNotice {
        source: Source,
        how_late_us: i64,
        when: i64,
    },
    BufferRequest {
        source: Source,
        offline_time: i64,
    },
    OutputBuffers {
        source: Source,
        destination: Destination,
        /// Buffer size of the group, `None` to revert to the producer's own pool.
        buffer_size: Option<usize>,
    },
}

/// A buffer handed to the host for delivery.
#[derive(Debug)]
pub struct Delivery {
    pub buffer: Buffer,
    pub source: Source,
    pub destination: Destination,
}

/// An in-process host.
///
/// Buffers go into a bounded queue the caller drains. A full queue refuses
/// the buffer instead of blocking. Every other outbound call is recorded as
/// a [`HostMessage`].
pub struct LoopbackHost {
    time_source: TimeSourceId,
    downstream_latency_us: AtomicI64,
    deliveries: Sender<Delivery>,
    messages: Mutex<Vec<HostMessage>>,
}

impl LoopbackHost {
    /// Creates a host whose delivery queue holds at most `capacity` buffers.
    pub fn new(capacity: usize) -> (Self, Receiver<Delivery>) {
        let (deliveries, receiver) = crossbeam_channel::bounded(capacity);
        let host = Self {
            time_source: TimeSourceId::new(),
            downstream_latency_us: AtomicI64::new(0),
            deliveries,
            messages: Mutex::new(Vec::new()),
        };
        (host, receiver)
    }

    /// Latency reported for any downstream consumer.
    pub fn set_downstream_latency(&self, latency_us: i64) {
        self.downstream_latency_us.store(latency_us, Ordering::Release);
    }

    pub fn messages(&self) -> Vec<HostMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    pub fn take_messages(&self) -> Vec<HostMessage> {
        self.messages
            .lock()
            .map(|mut messages| std::mem::take(&mut *messages))
            .unwrap_or_default()
    }

    fn record(&self, message: HostMessage) {
        trace!("Host message: {:?}", message);
        match self.messages.lock() {
            Ok(mut messages) => messages.push(message),
            Err(_) => error!("Host message log poisoned, dropping {:?}", message),
        }
    }
}

impl Host for LoopbackHost {
    fn time_source(&self) -> TimeSourceId {
        self.time_source
    }

    fn send_buffer(
        &self,
        buffer: Buffer,
        source: Source,
        destination: Destination,
    ) -> std::result::Result<(), SendFailure> {
        let delivery = Delivery {
            buffer,
            source,
            destination,
        };
        self.deliveries.try_send(delivery).map_err(|e| match e {
            TrySendError::Full(delivery) => SendFailure {
                buffer: delivery.buffer,
                code: QUEUE_FULL,
            },
            TrySendError::Disconnected(delivery) => SendFailure {
                buffer: delivery.buffer,
                code: NO_CONSUMER,
            },
        })
    }

    fn send_data_status(&self, status: DataStatus, destination: Destination, when: i64) -> Result<()> {
        self.record(HostMessage::DataStatus {
            status,
            destination,
            when,
        });
        Ok(())
    }

    fn send_latency_change(
        &self,
        source: Source,
        destination: Destination,
        latency_us: i64,
    ) -> Result<()> {
        self.record(HostMessage::LatencyChange {
            source,
            destination,
            latency_us,
        });
        Ok(())
    }

    fn notify_late_producer(&self, source: Source, how_late_us: i64, when: i64) -> Result<()> {
        self.record(HostMessage::LateNotice {
            source,
            how_late_us,
            when,
        });
        Ok(())
    }

    fn find_latency_for(&self, _source: Source, _destination: Destination) -> Result<(i64, TimeSourceId)> {
        Ok((
            self.downstream_latency_us.load(Ordering::Acquire),
            self.time_source,
        ))
    }

    fn request_additional_buffer(&self, source: Source, offline_time: i64) -> Result<()> {
        self.record(HostMessage::BufferRequest {
            source,
            offline_time,
        });
        Ok(())
    }

    fn set_output_buffers_for(
        &self,
        source: Source,
        destination: Destination,
        group: Option<BufferGroup>,
    ) -> Result<()> {
        self.record(HostMessage::OutputBuffers {
            source,
            destination,
            buffer_size: group.map(|group| group.buffer_size()),
        });
        Ok(())
    }
}
