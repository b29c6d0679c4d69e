// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Bindings of the node's single input and single output.
//!
//! The output connects in two phases. `prepare_to_connect` reserves it
//! against a destination and returns a fully specialized format; `connect`
//! then either establishes the reservation or, if the host reports an
//! error, releases it. While reserved, the output rejects a second
//! reservation.
//!
//! All methods here are pure state transitions. The node calls them under
//! its state lock and talks to the host afterwards.

use tracing::{debug, info};

use crate::{
    Error, Result,
    endpoint::{Destination, Input, LinkState, Output, Source},
    format::{FormatDescriptor, FormatNegotiator},
    latency::LatencyTracker,
};

#[derive(Debug, Clone)]
pub struct ConnectionState {
    input: Input,
    output: Output,
    /// The format both endpoints agree on once connected.
    working: FormatDescriptor,
    output_enabled: bool,
    output_established: bool,
    latency: LatencyTracker,
}

impl ConnectionState {
    pub fn new(input: Input, output: Output, scheduling_latency_us: i64) -> Self {
        Self {
            input,
            output,
            working: FormatDescriptor::raw_video(),
            output_enabled: true,
            output_established: false,
            latency: LatencyTracker::new(scheduling_latency_us),
        }
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    pub fn working_format(&self) -> &FormatDescriptor {
        &self.working
    }

    pub fn latency(&self) -> &LatencyTracker {
        &self.latency
    }

    pub fn latency_mut(&mut self) -> &mut LatencyTracker {
        &mut self.latency
    }

    pub fn output_enabled(&self) -> bool {
        self.output_enabled
    }

    pub fn input_state(&self) -> LinkState {
        if self.input.is_connected() {
            LinkState::Connected
        } else {
            LinkState::Unconnected
        }
    }

    pub fn output_state(&self) -> LinkState {
        match (self.output.is_connected(), self.output_established) {
            (false, _) => LinkState::Unconnected,
            (true, false) => LinkState::PendingOutput,
            (true, true) => LinkState::Connected,
        }
    }

    /// The upstream link `(producer source, own destination)`, if the input is bound.
    pub fn upstream(&self) -> Option<(Source, Destination)> {
        self.input
            .is_connected()
            .then_some((self.input.peer, self.input.local))
    }

    /// The downstream link `(own source, consumer destination)`, if the output is established.
    pub fn downstream(&self) -> Option<(Source, Destination)> {
        (self.output_state() == LinkState::Connected).then_some((self.output.local, self.output.peer))
    }

    pub fn check_destination(&self, destination: Destination) -> Result<()> {
        if destination == self.input.local {
            Ok(())
        } else {
            Err(Error::BadDestination)
        }
    }

    pub fn check_source(&self, source: Source) -> Result<()> {
        if source == self.output.local {
            Ok(())
        } else {
            Err(Error::BadSource)
        }
    }

    /// Binds the input to `source` and adopts `format` as the working format.
    pub fn bind_input(
        &mut self,
        source: Source,
        destination: Destination,
        format: &FormatDescriptor,
    ) -> Result<Input> {
        self.check_destination(destination)?;
        if self.input.is_connected() {
            return Err(Error::AlreadyConnected);
        }
        self.input.peer = source;
        self.input.format = format.clone();
        self.working = format.clone();
        info!("Input connected to {} with {}", source, format);
        Ok(self.input.clone())
    }

    /// Unbinds the input. Mismatched ids leave the state untouched.
    pub fn unbind_input(&mut self, source: Source, destination: Destination) -> Result<()> {
        self.check_destination(destination)?;
        if !self.input.is_connected() || self.input.peer != source {
            debug!("Disconnect from {} but input is bound to {}", source, self.input.peer);
            return Err(Error::NotConnected);
        }
        self.input.reset(&FormatDescriptor::raw_video());
        if self.output_state() == LinkState::Unconnected {
            self.working.clear_video();
        }
        info!("Input disconnected from {}", source);
        Ok(())
    }

    /// Reserves the output for `destination` and specializes `format` for it.
    ///
    /// On failure nothing changes, including `format`.
    pub fn reserve_output(
        &mut self,
        negotiator: &FormatNegotiator,
        source: Source,
        destination: Destination,
        format: &mut FormatDescriptor,
    ) -> Result<(Source, String)> {
        self.check_source(source)?;
        if self.output.is_connected() {
            debug!("Output already bound to {}", self.output.peer);
            return Err(Error::AlreadyConnected);
        }
        FormatNegotiator::check_kind(format)?;
        negotiator.specialize_output(format, &self.working)?;

        self.output.peer = destination;
        self.output.format = format.clone();
        self.output_established = false;
        debug!("Output reserved for {} with {}", destination, format);
        Ok((self.output.local, self.output.name.clone()))
    }

    /// Releases a reservation made by [`Self::reserve_output`].
    pub fn release_output(&mut self, source: Source, destination: Destination) -> Result<()> {
        self.check_source(source)?;
        if self.output_state() != LinkState::PendingOutput || self.output.peer != destination {
            return Err(Error::NotConnected);
        }
        self.output.reset(&self.working);
        debug!("Output reservation for {} released", destination);
        Ok(())
    }

    /// Completes a reservation. `format` becomes the working format.
    pub fn establish_output(
        &mut self,
        source: Source,
        destination: Destination,
        format: &FormatDescriptor,
    ) -> Result<()> {
        self.check_source(source)?;
        if self.output_state() != LinkState::PendingOutput || self.output.peer != destination {
            return Err(Error::NotConnected);
        }
        self.output.format = format.clone();
        self.working = format.clone();
        self.output_established = true;
        info!("Output connected to {} with {}", destination, format);
        Ok(())
    }

    /// Tears down the output. Mismatched ids leave the state untouched.
    pub fn unbind_output(&mut self, source: Source, destination: Destination) -> Result<()> {
        self.check_source(source)?;
        if self.output.peer != destination || destination.is_null() {
            return Err(Error::NotConnected);
        }
        self.output_established = false;
        if self.input_state() == LinkState::Unconnected {
            self.working.clear_video();
        }
        self.output.reset(&self.working);
        info!("Output disconnected from {}", destination);
        Ok(())
    }

    pub fn set_output_enabled(&mut self, source: Source, enabled: bool) -> Result<()> {
        self.check_source(source)?;
        self.output_enabled = enabled;
        Ok(())
    }
}
