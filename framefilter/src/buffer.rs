// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Media buffers and the pools they come from.
//!
//! A [`Buffer`] is move-only: whoever holds it is responsible for it. It
//! leaves a node exactly one way, either handed downstream through
//! [`crate::Host::send_buffer`] or returned to its pool with
//! [`Buffer::recycle`]. Dropping a pooled buffer also returns it to the pool,
//! but logs a warning since that path means some code forgot about it.

use std::{
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    endpoint::{Destination, TimeSourceId},
    format::MediaKind,
};

/// Identity of a buffer within its pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Routing and timing metadata carried with a buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferHeader {
    pub id: BufferId,
    pub kind: MediaKind,
    /// The input the buffer is addressed to.
    pub destination: Destination,
    /// Clock the start time was stamped against.
    pub time_source: TimeSourceId,
    /// Performance time in microseconds.
    pub start_time: i64,
    /// Number of valid payload bytes.
    pub size_used: usize,
}

impl BufferHeader {
    pub fn new(id: BufferId) -> Self {
        Self {
            id,
            kind: MediaKind::RawVideo,
            destination: Destination::null(),
            time_source: TimeSourceId(Uuid::nil()),
            start_time: 0,
            size_used: 0,
        }
    }
}

/// Takes back the storage of a buffer.
pub trait Recycle: Send + Sync {
    fn recycle(&self, id: BufferId, data: Vec<u8>);
}

/// A unit of media payload plus its header.
pub struct Buffer {
    header: BufferHeader,
    data: Vec<u8>,
    pool: Option<Arc<dyn Recycle>>,
}

impl Buffer {
    /// Wraps `data` as a buffer owned by `pool`.
    pub fn new(header: BufferHeader, data: Vec<u8>, pool: Arc<dyn Recycle>) -> Self {
        Self {
            header,
            data,
            pool: Some(pool),
        }
    }

    /// A buffer that belongs to no pool. Recycling it just frees it.
    pub fn unpooled(header: BufferHeader, data: Vec<u8>) -> Self {
        Self {
            header,
            data,
            pool: None,
        }
    }

    pub fn id(&self) -> BufferId {
        self.header.id
    }

    pub fn header(&self) -> &BufferHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut BufferHeader {
        &mut self.header
    }

    /// Total storage, regardless of `size_used`.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The valid part of the payload.
    pub fn payload(&self) -> &[u8] {
        let used = self.header.size_used.min(self.data.len());
        &self.data[..used]
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        let used = self.header.size_used.min(self.data.len());
        &mut self.data[..used]
    }

    /// Returns the buffer to the pool it was requested from.
    pub fn recycle(mut self) {
        self.give_back();
    }

    fn give_back(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.recycle(self.header.id, std::mem::take(&mut self.data));
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("header", &self.header)
            .field("capacity", &self.data.len())
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if self.pool.is_some() {
            warn!("Buffer {} dropped without being sent or recycled", self.header.id);
            self.give_back();
        }
    }
}

struct GroupInner {
    buffer_size: usize,
    free: Mutex<Vec<Vec<u8>>>,
    next_id: AtomicU64,
    outstanding: AtomicUsize,
    recycled: AtomicU64,
}

impl Recycle for GroupInner {
    fn recycle(&self, _id: BufferId, data: Vec<u8>) {
        match self.free.lock() {
            Ok(mut free) => free.push(data),
            Err(_) => error!("Buffer group mutex poisoned, dropping recycled storage"),
        }
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.recycled.fetch_add(1, Ordering::Relaxed);
    }
}

/// A fixed-size pool of equally sized buffers.
///
/// Cloning the group shares the pool.
#[derive(Clone)]
pub struct BufferGroup {
    inner: Arc<GroupInner>,
}

impl BufferGroup {
    /// Allocates `count` zeroed buffers of `buffer_size` bytes each.
    pub fn new(buffer_size: usize, count: usize) -> Self {
        let free = (0..count).map(|_| vec![0u8; buffer_size]).collect();
        Self {
            inner: Arc::new(GroupInner {
                buffer_size,
                free: Mutex::new(free),
                next_id: AtomicU64::new(1),
                outstanding: AtomicUsize::new(0),
                recycled: AtomicU64::new(0),
            }),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    /// Takes a free buffer from the pool, with `size_used` set to the full size.
    ///
    /// Returns `None` when every buffer is outstanding.
    pub fn request_buffer(&self) -> Option<Buffer> {
        let data = match self.inner.free.lock() {
            Ok(mut free) => free.pop()?,
            Err(_) => {
                error!("Buffer group mutex poisoned");
                return None;
            }
        };
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        let id = BufferId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let mut header = BufferHeader::new(id);
        header.size_used = self.inner.buffer_size;
        let pool: Arc<dyn Recycle> = self.inner.clone();
        Some(Buffer::new(header, data, pool))
    }

    /// Number of buffers currently handed out.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Number of buffers returned to the pool so far.
    pub fn recycled(&self) -> u64 {
        self.inner.recycled.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for BufferGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferGroup")
            .field("buffer_size", &self.inner.buffer_size)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}
