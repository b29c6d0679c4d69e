// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! The filter node: one raw-video input, one raw-video output and a
//! [`Transform`] in between.
//!
//! [`FilterNode`] implements [`ConsumerRole`], [`ProducerRole`] and
//! [`ControllableRole`]. Connection and latency state live behind a single
//! mutex that is never held while the transform runs or while the host is
//! called. The transform has its own lock, and the run state is atomic so a
//! Stop event is seen by the very next buffer.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use framefilter::{FilterNode, LocalRoster, LoopbackHost, NodeConfig, Passthrough};
//!
//! let (host, _deliveries) = LoopbackHost::new(8);
//! let roster = Arc::new(LocalRoster::new());
//! let node = FilterNode::builder(Arc::new(host), roster.clone())
//!     .config(NodeConfig::default().with_name("Passthrough"))
//!     .build(Passthrough)
//!     .unwrap();
//! assert!(roster.contains(node.id()));
//!
//! node.shutdown().unwrap();
//! assert!(!roster.contains(node.id()));
//! ```

use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering},
};

use crossbeam_channel::Receiver;
use tracing::{debug, error, info, trace, warn};

use crate::{
    Error, Result,
    buffer::{Buffer, BufferGroup, BufferId},
    config::{NodeConfig, RunMode},
    connection::ConnectionState,
    endpoint::{Destination, Input, LinkState, NodeId, Output, Source, TimeSourceId},
    format::{FormatDescriptor, FormatNegotiator, MediaKind},
    host::{DataStatus, Host},
    latency::{LatencyTracker, measure_processing_latency},
    params::{ParamId, ParameterChange, ParameterSpec, ParameterStore, ParameterValue},
    pipeline::{PipelineCounters, PipelineStats},
    roles::{ConsumerRole, ControllableRole, ProducerRole},
    roster::{NodeInfo, NodeKinds, Roster},
    scheduler::{Clock, EventHandler, EventKind, EventScheduler, SystemClock, TimedEvent},
    transform::{Transform, TransformSlot},
};

/// Lifecycle of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    /// Registered, filter not running.
    Idle = 0,
    Running = 1,
    /// Torn down. Terminal.
    Stopped = 2,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RunState::Idle,
            1 => RunState::Running,
            _ => RunState::Stopped,
        }
    }
}

/// The most recent time discontinuities seen by the control thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeline {
    /// `(media time, performance time)` of the last seek.
    pub last_seek: Option<(i64, i64)>,
    /// `(real time, performance time)` of the last time warp.
    pub last_warp: Option<(i64, i64)>,
}

/// Locks `mutex`, carrying on with the inner state if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        error!("Node mutex poisoned, continuing with last state");
        poisoned.into_inner()
    })
}

/// State shared between the role handlers and the control thread.
pub(crate) struct NodeCore {
    pub(crate) id: NodeId,
    pub(crate) config: NodeConfig,
    pub(crate) negotiator: FormatNegotiator,
    pub(crate) state: Mutex<ConnectionState>,
    /// Never locked on the control thread.
    pub(crate) transform: Mutex<TransformSlot>,
    pub(crate) params: ParameterStore,
    pub(crate) host: Arc<dyn Host>,
    pub(crate) run_state: AtomicU8,
    pub(crate) run_mode: Mutex<RunMode>,
    pub(crate) offline_time: AtomicI64,
    pub(crate) timeline: Mutex<Timeline>,
    pub(crate) stats: PipelineStats,
}

impl NodeCore {
    pub(crate) fn run_state(&self) -> RunState {
        RunState::from_u8(self.run_state.load(Ordering::Acquire))
    }

    pub(crate) fn run_mode(&self) -> RunMode {
        *lock(&self.run_mode)
    }

    fn transition(&self, from: RunState, to: RunState) -> bool {
        self.run_state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl EventHandler for NodeCore {
    fn handle_event(&self, event: &TimedEvent, lateness_us: i64) {
        trace!(
            "{}: {:?} at {} ({} us late)",
            self.config.name, event.kind, event.performance_time, lateness_us
        );
        match event.kind {
            EventKind::Start => {
                if self.transition(RunState::Idle, RunState::Running) {
                    info!("{} started", self.config.name);
                }
            }
            EventKind::Stop => {
                if self.transition(RunState::Running, RunState::Idle) {
                    info!("{} stopped", self.config.name);
                }
            }
            EventKind::Seek { media_time } => {
                debug!("{} seek to media time {}", self.config.name, media_time);
                lock(&self.timeline).last_seek = Some((media_time, event.performance_time));
            }
            EventKind::TimeWarp { real_time } => {
                debug!("{} time warp to real time {}", self.config.name, real_time);
                lock(&self.timeline).last_warp = Some((real_time, event.performance_time));
            }
            EventKind::Parameter { id, value } => {
                self.params.set(id, event.performance_time, Some(value));
            }
            EventKind::Other(code) => {
                trace!("{} ignoring event {}", self.config.name, code);
            }
        }
    }
}

/// Collects what a [`FilterNode`] needs before it can register.
pub struct NodeBuilder {
    host: Arc<dyn Host>,
    roster: Arc<dyn Roster>,
    config: NodeConfig,
    clock: Arc<dyn Clock>,
    parameters: Vec<ParameterSpec>,
}

impl NodeBuilder {
    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock the control thread dispatches against. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn parameters(mut self, parameters: Vec<ParameterSpec>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Creates the node, registers it with the roster and starts its control thread.
    ///
    /// # Errors
    ///
    /// Fails if the roster refuses the node or the control thread cannot be
    /// spawned. Nothing stays registered on failure.
    pub fn build(self, transform: impl Transform + 'static) -> Result<FilterNode> {
        let input = Input::new(Destination::new(), &self.config.input_name);
        let output = Output::new(Source::new(), &self.config.output_name);
        let negotiator = FormatNegotiator::new(input.local, self.config.preferred);
        let state = ConnectionState::new(input, output, self.config.scheduling_latency_us);

        let core = Arc::new(NodeCore {
            id: NodeId::new(),
            negotiator,
            state: Mutex::new(state),
            transform: Mutex::new(TransformSlot::new(Box::new(transform))),
            params: ParameterStore::new(self.parameters),
            host: self.host,
            run_state: AtomicU8::new(RunState::Idle as u8),
            run_mode: Mutex::new(self.config.run_mode),
            offline_time: AtomicI64::new(0),
            timeline: Mutex::new(Timeline::default()),
            stats: PipelineStats::default(),
            config: self.config,
        });

        self.roster.register_node(NodeInfo {
            id: core.id,
            name: core.config.name.clone(),
            kinds: NodeKinds::FILTER,
        })?;

        let node = FilterNode {
            core,
            roster: self.roster,
            clock: self.clock,
            scheduler: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        };
        if let Err(e) = node.node_registered() {
            node.shutdown()?;
            return Err(e);
        }
        Ok(node)
    }
}

/// A registered filter node.
///
/// Dropping the node shuts it down.
pub struct FilterNode {
    core: Arc<NodeCore>,
    roster: Arc<dyn Roster>,
    clock: Arc<dyn Clock>,
    scheduler: Mutex<Option<EventScheduler>>,
    shut_down: AtomicBool,
}

impl FilterNode {
    pub fn builder(host: Arc<dyn Host>, roster: Arc<dyn Roster>) -> NodeBuilder {
        NodeBuilder {
            host,
            roster,
            config: NodeConfig::default(),
            clock: Arc::new(SystemClock::new()),
            parameters: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.core.id
    }

    pub fn name(&self) -> &str {
        &self.core.config.name
    }

    pub fn config(&self) -> &NodeConfig {
        &self.core.config
    }

    /// The identity producers address buffers to.
    pub fn destination(&self) -> Destination {
        lock(&self.core.state).input().local
    }

    /// The identity consumers see as this node's output.
    pub fn source(&self) -> Source {
        lock(&self.core.state).output().local
    }

    pub fn input(&self) -> Input {
        lock(&self.core.state).input().clone()
    }

    pub fn output(&self) -> Output {
        lock(&self.core.state).output().clone()
    }

    pub fn input_state(&self) -> LinkState {
        lock(&self.core.state).input_state()
    }

    pub fn output_state(&self) -> LinkState {
        lock(&self.core.state).output_state()
    }

    pub fn working_format(&self) -> FormatDescriptor {
        lock(&self.core.state).working_format().clone()
    }

    pub fn latency(&self) -> LatencyTracker {
        *lock(&self.core.state).latency()
    }

    pub fn stats(&self) -> PipelineCounters {
        self.core.stats.counters()
    }

    pub fn run_state(&self) -> RunState {
        self.core.run_state()
    }

    pub fn timeline(&self) -> Timeline {
        *lock(&self.core.timeline)
    }

    /// Starts the control thread. Called once the roster knows the node.
    ///
    /// Calling it again while the thread runs is a no-op.
    pub fn node_registered(&self) -> Result<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(Error::Scheduler(format!("{} is shut down", self.name())));
        }
        let mut scheduler = lock(&self.scheduler);
        if scheduler.is_some() {
            return Ok(());
        }
        let handler: Arc<dyn EventHandler> = self.core.clone();
        *scheduler = Some(EventScheduler::spawn(
            self.name(),
            self.core.config.priority,
            self.clock.clone(),
            handler,
        )?);
        Ok(())
    }

    pub fn set_run_mode(&self, mode: RunMode) {
        let mut current = lock(&self.core.run_mode);
        if *current != mode {
            info!("{} run mode {:?} -> {:?}", self.name(), *current, mode);
            *current = mode;
        }
    }

    pub fn run_mode(&self) -> RunMode {
        self.core.run_mode()
    }

    /// Start time of the last buffer handled in offline mode.
    pub fn offline_time(&self) -> i64 {
        self.core.offline_time.load(Ordering::Acquire)
    }

    /// Queues an event on the control thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Scheduler`] once the node has been shut down.
    pub fn push_event(&self, event: TimedEvent) -> Result<()> {
        match lock(&self.scheduler).as_ref() {
            Some(scheduler) => scheduler.push(event),
            None => Err(Error::Scheduler(format!("{} has no control thread", self.name()))),
        }
    }

    pub fn start(&self, performance_time: i64) -> Result<()> {
        self.push_event(TimedEvent::new(EventKind::Start, performance_time))
    }

    pub fn stop(&self, performance_time: i64) -> Result<()> {
        self.push_event(TimedEvent::new(EventKind::Stop, performance_time))
    }

    pub fn seek(&self, media_time: i64, performance_time: i64) -> Result<()> {
        self.push_event(TimedEvent::new(EventKind::Seek { media_time }, performance_time))
    }

    pub fn time_warp(&self, real_time: i64, performance_time: i64) -> Result<()> {
        self.push_event(TimedEvent::new(EventKind::TimeWarp { real_time }, performance_time))
    }

    /// Schedules a parameter change for `performance_time`.
    pub fn schedule_parameter(
        &self,
        id: ParamId,
        value: ParameterValue,
        performance_time: i64,
    ) -> Result<()> {
        self.push_event(TimedEvent::new(EventKind::Parameter { id, value }, performance_time))
    }

    /// Quits the control thread and unregisters the node. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let scheduler = lock(&self.scheduler).take();
        let quit = match scheduler {
            Some(mut scheduler) => scheduler.quit(),
            None => Ok(()),
        };

        self.core
            .run_state
            .store(RunState::Stopped as u8, Ordering::Release);
        lock(&self.core.transform).sync(false);

        self.roster.unregister_node(self.core.id)?;
        info!("{} shut down", self.name());
        quit
    }

    fn log_rejected(&self, operation: &str, error: &Error) {
        debug!("{}: {} rejected: {}", self.name(), operation, error);
    }
}

impl Drop for FilterNode {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Failed to shut down {}: {}", self.name(), e);
        }
    }
}

impl ConsumerRole for FilterNode {
    fn accept_format(&self, destination: Destination, format: &mut FormatDescriptor) -> Result<()> {
        trace!("{}: accept_format {}", self.name(), format);
        self.core
            .negotiator
            .negotiate(destination, format)
            .inspect_err(|e| self.log_rejected("accept_format", e))
    }

    fn connected(
        &self,
        source: Source,
        destination: Destination,
        format: &FormatDescriptor,
    ) -> Result<Input> {
        trace!("{}: connected from {}", self.name(), source);
        lock(&self.core.state)
            .bind_input(source, destination, format)
            .inspect_err(|e| self.log_rejected("connected", e))
    }

    fn disconnected(&self, source: Source, destination: Destination) {
        trace!("{}: disconnected from {}", self.name(), source);
        if let Err(e) = lock(&self.core.state).unbind_input(source, destination) {
            self.log_rejected("disconnected", &e);
        }
    }

    fn buffer_received(&self, buffer: Buffer) {
        self.core.process_buffer(buffer);
    }

    fn producer_data_status(&self, destination: Destination, status: DataStatus, when: i64) {
        let downstream = {
            let state = lock(&self.core.state);
            if let Err(e) = state.check_destination(destination) {
                self.log_rejected("producer_data_status", &e);
                return;
            }
            state.downstream()
        };
        if let Some((_, consumer)) = downstream
            && let Err(e) = self.core.host.send_data_status(status, consumer, when)
        {
            error!("{}: failed to forward data status: {}", self.name(), e);
        }
    }

    fn get_latency_for(&self, destination: Destination) -> Result<(i64, TimeSourceId)> {
        let latency = {
            let state = lock(&self.core.state);
            state.check_destination(destination)?;
            state.latency().event_latency()
        };
        Ok((latency, self.core.host.time_source()))
    }

    fn format_changed(
        &self,
        source: Source,
        _destination: Destination,
        format: &FormatDescriptor,
    ) -> Result<()> {
        debug!("{}: refusing format change from {} to {}", self.name(), source, format);
        Err(Error::BadFormat)
    }

    fn get_next_input(&self, cookie: &mut usize) -> Result<Input> {
        if *cookie != 0 {
            return Err(Error::BadIndex);
        }
        *cookie += 1;
        Ok(self.input())
    }

    fn seek_tag_requested(&self, _destination: Destination, _target_time: i64) -> Result<()> {
        Err(Error::Unsupported("seek tags"))
    }
}

impl ProducerRole for FilterNode {
    fn format_suggestion_requested(
        &self,
        kind: MediaKind,
        _quality: i32,
        format: &mut FormatDescriptor,
    ) -> Result<()> {
        if kind != MediaKind::RawVideo {
            self.log_rejected("format_suggestion_requested", &Error::BadFormat);
            return Err(Error::BadFormat);
        }
        *format = self.working_format();
        Ok(())
    }

    fn format_proposal(&self, source: Source, format: &mut FormatDescriptor) -> Result<()> {
        let state = lock(&self.core.state);
        state.check_source(source)?;
        FormatNegotiator::check_kind(format)?;
        *format = state.working_format().clone();
        Ok(())
    }

    fn format_change_requested(
        &self,
        _source: Source,
        destination: Destination,
        _format: &mut FormatDescriptor,
    ) -> Result<()> {
        debug!("{}: refusing format change requested by {}", self.name(), destination);
        Err(Error::BadFormat)
    }

    fn prepare_to_connect(
        &self,
        source: Source,
        destination: Destination,
        format: &mut FormatDescriptor,
    ) -> Result<(Source, String)> {
        trace!("{}: prepare_to_connect to {}", self.name(), destination);
        lock(&self.core.state)
            .reserve_output(&self.core.negotiator, source, destination, format)
            .inspect_err(|e| self.log_rejected("prepare_to_connect", e))
    }

    fn connect(
        &self,
        status: Result<()>,
        source: Source,
        destination: Destination,
        format: &FormatDescriptor,
        name: &mut String,
    ) {
        if let Err(e) = status {
            warn!("{}: connection to {} failed: {}", self.name(), destination, e);
            if let Err(e) = lock(&self.core.state).release_output(source, destination) {
                self.log_rejected("connect", &e);
            }
            return;
        }

        {
            let mut state = lock(&self.core.state);
            if let Err(e) = state.establish_output(source, destination, format) {
                self.log_rejected("connect", &e);
                return;
            }
            name.clone_from(&state.output().name);
        }

        let downstream = match self.core.host.find_latency_for(source, destination) {
            Ok((latency, _)) => Some(latency),
            Err(e) => {
                warn!("{}: no downstream latency for {}: {}", self.name(), destination, e);
                None
            }
        };

        let processing = {
            let mut slot = lock(&self.core.transform);
            measure_processing_latency(format, slot.transform(), &self.core.params)
        };

        let upstream = {
            let mut state = lock(&self.core.state);
            let latency = state.latency_mut();
            if let Some(downstream) = downstream {
                latency.set_downstream(downstream);
            }
            latency.set_processing(processing);
            let total = latency.total();
            state.upstream().map(|link| (link, total))
        };

        if let Some(((producer, own_input), total)) = upstream
            && let Err(e) = self.core.host.send_latency_change(producer, own_input, total)
        {
            error!("{}: failed to report latency upstream: {}", self.name(), e);
        }
    }

    fn disconnect(&self, source: Source, destination: Destination) {
        trace!("{}: disconnect from {}", self.name(), destination);
        if let Err(e) = lock(&self.core.state).unbind_output(source, destination) {
            self.log_rejected("disconnect", &e);
        }
    }

    fn latency_changed(&self, source: Source, destination: Destination, latency_us: i64) {
        let upstream = {
            let mut state = lock(&self.core.state);
            if state.downstream() != Some((source, destination)) {
                debug!("{}: latency change for unknown link to {}", self.name(), destination);
                return;
            }
            state.latency_mut().set_downstream(latency_us);
            let total = state.latency().total();
            state.upstream().map(|link| (link, total))
        };
        if let Some(((producer, own_input), total)) = upstream
            && let Err(e) = self.core.host.send_latency_change(producer, own_input, total)
        {
            error!("{}: failed to report latency upstream: {}", self.name(), e);
        }
    }

    fn late_notice_received(&self, source: Source, how_late_us: i64, when: i64) {
        let upstream = {
            let state = lock(&self.core.state);
            if let Err(e) = state.check_source(source) {
                self.log_rejected("late_notice_received", &e);
                return;
            }
            state.upstream()
        };
        match upstream {
            Some((producer, _)) => {
                if let Err(e) = self.core.host.notify_late_producer(producer, how_late_us, when) {
                    error!("{}: failed to notify producer: {}", self.name(), e);
                }
            }
            None => warn!("{}: {} us late, no input to blame", self.name(), how_late_us),
        }
    }

    fn enable_output(&self, source: Source, enabled: bool) {
        if let Err(e) = lock(&self.core.state).set_output_enabled(source, enabled) {
            self.log_rejected("enable_output", &e);
        }
    }

    fn set_buffer_group(&self, source: Source, group: Option<BufferGroup>) -> Result<()> {
        let (producer, own_input) = {
            let state = lock(&self.core.state);
            state.check_source(source)?;
            state.upstream().ok_or(Error::NoProducer)?
        };
        self.core
            .host
            .set_output_buffers_for(producer, own_input, group)
    }

    fn additional_buffer_requested(&self, source: Source, previous: BufferId, previous_time: i64) {
        let upstream = {
            let state = lock(&self.core.state);
            if let Err(e) = state.check_source(source) {
                self.log_rejected("additional_buffer_requested", &e);
                return;
            }
            state.upstream()
        };
        let Some((producer, _)) = upstream else {
            trace!("{}: no producer for buffer request after {}", self.name(), previous);
            return;
        };
        trace!("{}: additional buffer after {} ({})", self.name(), previous, previous_time);
        if let Err(e) = self
            .core
            .host
            .request_additional_buffer(producer, self.offline_time())
        {
            error!("{}: failed to request a buffer upstream: {}", self.name(), e);
        }
    }

    fn get_latency(&self) -> i64 {
        lock(&self.core.state).latency().total()
    }

    fn get_next_output(&self, cookie: &mut usize) -> Result<Output> {
        if *cookie != 0 {
            return Err(Error::BadIndex);
        }
        *cookie += 1;
        Ok(self.output())
    }

    fn set_play_rate(&self, _numerator: i32, _denominator: i32) -> Result<()> {
        Err(Error::Unsupported("play rate"))
    }

    fn video_clipping_changed(&self, _source: Source) -> Result<()> {
        Err(Error::Unsupported("video clipping"))
    }
}

impl ControllableRole for FilterNode {
    fn parameters(&self) -> &[ParameterSpec] {
        self.core.params.specs()
    }

    fn get_parameter_value(&self, id: ParamId) -> Result<(i64, ParameterValue)> {
        let (value, last_change) = self.core.params.get(id)?;
        Ok((last_change, value))
    }

    fn set_parameter_value(&self, id: ParamId, when: i64, raw: &[u8]) {
        self.core.params.set_raw(id, when, raw);
    }

    fn subscribe_parameters(&self) -> Receiver<ParameterChange> {
        self.core.params.subscribe()
    }
}
