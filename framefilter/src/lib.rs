// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! # framefilter - streaming video filter nodes
//!
//! The core of a single-input, single-output video filter node that sits in
//! a media graph, negotiates a raw-video format with its neighbours,
//! transforms each frame in place and passes it on.
//!
//! ## Overview
//!
//! A node talks to the rest of the graph only through a [`Host`]. The host
//! calls into the node through three role traits and the node calls back
//! through the [`Host`] trait:
//!
//! - **[`ConsumerRole`]**: requests from the upstream producer (format
//!   negotiation, connection of the input, buffer delivery)
//! - **[`ProducerRole`]**: requests from the downstream consumer (two-phase
//!   connection of the output, latency, buffer groups)
//! - **[`ControllableRole`]**: parameter access for controllers
//!
//! ### Key Concepts
//!
//! - **Format**: a [`FormatDescriptor`] whose fields are concrete or
//!   wildcard. The [`FormatNegotiator`] turns a proposal into a fully
//!   concrete RGB32 format or rejects it without touching it.
//! - **Endpoint**: the node's [`Input`] and [`Output`], each bound to at most
//!   one peer. The output connects in two phases (reserve, then establish).
//! - **Buffer**: a move-only [`Buffer`] that leaves the node exactly once,
//!   either sent downstream or recycled into its [`BufferGroup`].
//! - **Transform**: the per-variant pixel operation ([`Transform`]).
//! - **Events**: Start, Stop, Seek, TimeWarp and parameter changes are
//!   dispatched on the node's control thread in performance-time order.
//!
//! ## Architecture
//!
//! ```text
//!  producer ──buffer──► FilterNode ──send_buffer──► consumer
//!                           │
//!            ┌──────────────┼─────────────────┐
//!            │              │                 │
//!     ConnectionState   Transform      EventScheduler
//!     + LatencyTracker  + ParameterStore  (control thread)
//! ```
//!
//! ## Thread Safety
//!
//! - [`FilterNode`] is `Send + Sync`. Role methods may be called from any
//!   thread, concurrently with buffer delivery.
//! - Connection state is guarded by one mutex that is never held across the
//!   transform or a host call.
//! - Hosts must not block in [`Host::send_buffer`].

mod buffer;
mod connection;
mod endpoint;
mod error;
mod format;
mod host;
mod latency;
mod node;
mod params;
mod pipeline;
mod roles;
mod roster;
mod scheduler;
mod transform;

pub mod config;

pub use buffer::{Buffer, BufferGroup, BufferHeader, BufferId, Recycle};
pub use config::{NodeConfig, RunMode, StoppedBufferPolicy, ThreadPriority};
pub use connection::ConnectionState;
pub use endpoint::{
    Destination, Endpoint, EndpointId, EndpointRole, Input, LinkState, NodeId, Output, Source,
    TimeSourceId,
};
pub use error::{Error, Result};
pub use format::{
    BYTES_PER_PIXEL, FormatDescriptor, FormatNegotiator, MediaKind, Orientation, PixelLayout,
    PreferredFormat,
};
pub use host::{
    DataStatus, Delivery, Host, HostMessage, LoopbackHost, NO_CONSUMER, QUEUE_FULL, SendFailure,
};
pub use latency::{LatencyTracker, measure_processing_latency};
pub use node::{FilterNode, NodeBuilder, RunState, Timeline};
pub use params::{
    ParamId, ParameterChange, ParameterKind, ParameterSnapshot, ParameterSpec, ParameterStore,
    ParameterValue,
};
pub use pipeline::{Disposition, PipelineCounters, RecycleReason};
pub use roles::{ConsumerRole, ControllableRole, ProducerRole};
pub use roster::{FlavorInfo, LocalRoster, NodeInfo, NodeKinds, Roster};
pub use scheduler::{
    Clock, EventHandler, EventKind, EventScheduler, ManualClock, SystemClock, TimedEvent,
};
pub use transform::{Passthrough, Transform};
