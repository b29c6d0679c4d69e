// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for filter-node protocol operations.
//!
//! Structural errors (identity, format, connection state) are returned
//! synchronously to the caller and never leave the node half-mutated.
//! Buffer-path failures are handled inside the node and only surface
//! through logging.

use crate::params::ParamId;

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur when talking to a filter node or its host.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The caller addressed a destination that is not this node's input.
    #[error("Bad destination")]
    BadDestination,

    /// The caller addressed a source that is not this node's output.
    #[error("Bad source")]
    BadSource,

    /// The format failed negotiation, or a format change was requested on a
    /// connected stream.
    #[error("Bad format")]
    BadFormat,

    /// The endpoint is already bound (or reserved) to a peer.
    #[error("Already connected")]
    AlreadyConnected,

    /// The operation needs a bound peer on an endpoint that is unconnected.
    #[error("Not connected")]
    NotConnected,

    /// The operation needs an upstream producer and the input is unbound.
    #[error("No producer")]
    NoProducer,

    /// The host could not forward a buffer or message.
    ///
    /// The code is the host's own status value and is not interpreted here.
    #[error("Send failed with code {0}")]
    SendFailed(i32),

    /// The controller asked for a parameter this node variant does not have.
    #[error("Unknown parameter {0}")]
    UnknownParameter(ParamId),

    /// Enumeration cookie out of range (single input / single output).
    #[error("Bad index")]
    BadIndex,

    /// The request is well-formed but not supported by this node.
    #[error("Unsupported: {0}")]
    Unsupported(&'static str),

    /// The event scheduler could not be started or has already quit.
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Configuration could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A generic error for failures that have no dedicated variant.
    #[error("Other error: {0}")]
    Other(String),
}
