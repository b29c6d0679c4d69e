// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Timed control events and the thread that dispatches them.
//!
//! Events are pushed from any thread and dispatched on the node's own
//! control thread once the clock reaches their performance time. Events
//! that are due together are dispatched in time order, and events with the
//! same time in the order they were pushed.

use std::{
    cmp::Ordering as CmpOrdering,
    collections::BinaryHeap,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, trace};

use crate::{
    Error, Result,
    config::ThreadPriority,
    params::{ParamId, ParameterValue},
};

/// Source of performance time, in microseconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Monotonic clock starting at 0 when created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_micros()).unwrap_or(i64::MAX)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::Release);
    }

    pub fn advance(&self, delta: i64) {
        self.now.fetch_add(delta, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    Start,
    Stop,
    Seek { media_time: i64 },
    TimeWarp { real_time: i64 },
    Parameter { id: ParamId, value: ParameterValue },
    /// Anything the node does not interpret.
    Other(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent {
    pub kind: EventKind,
    /// Performance time the event is due at.
    pub performance_time: i64,
}

impl TimedEvent {
    pub fn new(kind: EventKind, performance_time: i64) -> Self {
        Self {
            kind,
            performance_time,
        }
    }
}

/// Receives events from the control thread.
pub trait EventHandler: Send + Sync + 'static {
    /// `lateness_us` is how far past its performance time the event was dispatched.
    fn handle_event(&self, event: &TimedEvent, lateness_us: i64);
}

enum Command {
    Push(TimedEvent),
    Quit,
}

struct Queued {
    event: TimedEvent,
    seq: u64,
}

// Min-heap on (time, seq).
impl Ord for Queued {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .event
            .performance_time
            .cmp(&self.event.performance_time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Queued {}

/// Owns a node's control thread.
///
/// Dropping the scheduler quits the thread and waits for it.
pub struct EventScheduler {
    sender: Sender<Command>,
    thread: Option<JoinHandle<()>>,
    name: String,
}

impl EventScheduler {
    /// Starts the control thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Scheduler`] if the OS refuses to spawn the thread.
    pub fn spawn(
        name: &str,
        priority: ThreadPriority,
        clock: Arc<dyn Clock>,
        handler: Arc<dyn EventHandler>,
    ) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let thread_name = format!("{name} control");
        let thread = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || control_loop(receiver, clock, handler))
            .map_err(|e| Error::Scheduler(format!("Failed to spawn {thread_name}: {e}")))?;
        info!(
            "Started control thread {} ({})",
            thread_name,
            priority.description()
        );
        Ok(Self {
            sender,
            thread: Some(thread),
            name: thread_name,
        })
    }

    /// Queues `event` for dispatch at its performance time.
    pub fn push(&self, event: TimedEvent) -> Result<()> {
        self.sender
            .send(Command::Push(event))
            .map_err(|_| Error::Scheduler(format!("{} has quit", self.name)))
    }

    /// Stops the control thread. Events still queued are discarded.
    pub fn quit(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        // The loop may already be gone if the handler panicked.
        let _ = self.sender.send(Command::Quit);
        thread
            .join()
            .map_err(|_| Error::Scheduler(format!("{} panicked", self.name)))?;
        info!("Stopped control thread {}", self.name);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for EventScheduler {
    fn drop(&mut self) {
        if let Err(e) = self.quit() {
            error!("Failed to stop control thread: {}", e);
        }
    }
}

fn control_loop(receiver: Receiver<Command>, clock: Arc<dyn Clock>, handler: Arc<dyn EventHandler>) {
    let mut queue = BinaryHeap::new();
    let mut seq = 0u64;

    loop {
        let now = clock.now();
        while queue
            .peek()
            .is_some_and(|next: &Queued| next.event.performance_time <= now)
        {
            if let Some(due) = queue.pop() {
                let lateness = now - due.event.performance_time;
                trace!("Dispatching {:?}, {} us late", due.event.kind, lateness);
                handler.handle_event(&due.event, lateness);
            }
        }

        let command = match queue.peek() {
            Some(next) => {
                let wait = u64::try_from(next.event.performance_time - now).unwrap_or(0);
                match receiver.recv_timeout(Duration::from_micros(wait)) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match receiver.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        match command {
            Command::Push(event) => {
                queue.push(Queued { event, seq });
                seq += 1;
            }
            Command::Quit => break,
        }
    }

    if !queue.is_empty() {
        debug!("Control loop exiting with {} pending events", queue.len());
    }
}
