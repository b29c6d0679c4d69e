// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! The three faces a filter node shows to the host.
//!
//! The host calls [`ConsumerRole`] on behalf of the upstream producer,
//! [`ProducerRole`] on behalf of the downstream consumer and
//! [`ControllableRole`] on behalf of a controller. Calls may arrive
//! concurrently from different threads.

use crossbeam_channel::Receiver;

use crate::{
    Result,
    buffer::{Buffer, BufferGroup, BufferId},
    endpoint::{Destination, Input, Output, Source, TimeSourceId},
    format::{FormatDescriptor, MediaKind},
    host::DataStatus,
    params::{ParamId, ParameterChange, ParameterSpec, ParameterValue},
};

/// Requests concerning the node's input.
pub trait ConsumerRole {
    /// Negotiates a format for the input. See [`crate::FormatNegotiator::negotiate`].
    fn accept_format(&self, destination: Destination, format: &mut FormatDescriptor) -> Result<()>;

    /// Binds the input to `source`.
    fn connected(
        &self,
        source: Source,
        destination: Destination,
        format: &FormatDescriptor,
    ) -> Result<Input>;

    fn disconnected(&self, source: Source, destination: Destination);

    /// Filters and forwards one buffer, or recycles it.
    fn buffer_received(&self, buffer: Buffer);

    /// Relays a data status change downstream.
    fn producer_data_status(&self, destination: Destination, status: DataStatus, when: i64);

    /// Latency a buffer experiences from the input onwards.
    fn get_latency_for(&self, destination: Destination) -> Result<(i64, TimeSourceId)>;

    /// Mid-stream format changes are refused.
    fn format_changed(
        &self,
        source: Source,
        destination: Destination,
        format: &FormatDescriptor,
    ) -> Result<()>;

    /// Enumerates inputs. Only cookie 0 exists.
    fn get_next_input(&self, cookie: &mut usize) -> Result<Input>;

    fn seek_tag_requested(&self, destination: Destination, target_time: i64) -> Result<()>;
}

/// Requests concerning the node's output.
pub trait ProducerRole {
    /// Suggests an output format for `kind`, returning the working format.
    ///
    /// `quality` is the consumer's hint and does not change the suggestion.
    fn format_suggestion_requested(
        &self,
        kind: MediaKind,
        quality: i32,
        format: &mut FormatDescriptor,
    ) -> Result<()>;

    /// Checks a proposal for the output, replacing it with the working format.
    fn format_proposal(&self, source: Source, format: &mut FormatDescriptor) -> Result<()>;

    /// Mid-stream format changes are refused.
    fn format_change_requested(
        &self,
        source: Source,
        destination: Destination,
        format: &mut FormatDescriptor,
    ) -> Result<()>;

    /// First connect phase: reserves the output and specializes `format`.
    fn prepare_to_connect(
        &self,
        source: Source,
        destination: Destination,
        format: &mut FormatDescriptor,
    ) -> Result<(Source, String)>;

    /// Second connect phase. `status` is the host's verdict on the connection.
    ///
    /// On success `name` receives the output's name.
    fn connect(
        &self,
        status: Result<()>,
        source: Source,
        destination: Destination,
        format: &FormatDescriptor,
        name: &mut String,
    );

    fn disconnect(&self, source: Source, destination: Destination);

    fn latency_changed(&self, source: Source, destination: Destination, latency_us: i64);

    fn late_notice_received(&self, source: Source, how_late_us: i64, when: i64);

    fn enable_output(&self, source: Source, enabled: bool);

    /// Routes a downstream buffer group to the upstream producer.
    fn set_buffer_group(&self, source: Source, group: Option<BufferGroup>) -> Result<()>;

    /// Passes a buffer request on to the upstream producer.
    fn additional_buffer_requested(&self, source: Source, previous: BufferId, previous_time: i64);

    /// Total latency the node reports upstream.
    fn get_latency(&self) -> i64;

    /// Enumerates outputs. Only cookie 0 exists.
    fn get_next_output(&self, cookie: &mut usize) -> Result<Output>;

    fn set_play_rate(&self, numerator: i32, denominator: i32) -> Result<()>;

    fn video_clipping_changed(&self, source: Source) -> Result<()>;
}

/// Parameter access for controllers.
pub trait ControllableRole {
    fn parameters(&self) -> &[ParameterSpec];

    /// Returns `(last change time, value)`.
    fn get_parameter_value(&self, id: ParamId) -> Result<(i64, ParameterValue)>;

    /// Sets a parameter from its raw little-endian encoding. Invalid input is ignored.
    fn set_parameter_value(&self, id: ParamId, when: i64, raw: &[u8]);

    fn subscribe_parameters(&self) -> Receiver<ParameterChange>;
}
