// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Endpoint identities and the input/output connection points of a node.
//!
//! Identities are opaque UUID-backed values. The nil UUID is the
//! "unconnected" sentinel, so an endpoint's peer is either a real identity
//! or [`Source::null`] / [`Destination::null`].

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::format::FormatDescriptor;

/// Identity of a node as known to the roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a time source (clock) a buffer was stamped against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSourceId(pub Uuid);

impl TimeSourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimeSourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimeSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Common behaviour of the two identity kinds.
pub trait EndpointId: Copy + Eq + fmt::Debug {
    /// The "unconnected" sentinel.
    fn null() -> Self;

    fn is_null(&self) -> bool;
}

macro_rules! endpoint_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Allocates a fresh identity.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub const fn null() -> Self {
                Self(Uuid::nil())
            }

            pub fn is_null(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::null()
            }
        }

        impl EndpointId for $name {
            fn null() -> Self {
                $name::null()
            }

            fn is_null(&self) -> bool {
                $name::is_null(self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_null() {
                    f.write_str("null")
                } else {
                    write!(f, "{}", self.0)
                }
            }
        }
    };
}

endpoint_id!(
    /// The producing side of a connection (an output's own identity).
    Source
);

endpoint_id!(
    /// The consuming side of a connection (an input's own identity).
    Destination
);

/// Which side of the node an endpoint sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointRole {
    Input,
    Output,
}

/// Connection state of a single endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    /// Peer is the null sentinel.
    Unconnected,
    /// Output reserved by `prepare_to_connect`, waiting for `connect`.
    PendingOutput,
    Connected,
}

/// A connection point: own identity, peer identity and the format on the link.
///
/// `L` is the local identity type and `P` the peer identity type, so an
/// [`Input`] is addressed by a [`Destination`] and bound to a [`Source`],
/// and the reverse for an [`Output`].
#[derive(Clone, Debug, PartialEq)]
pub struct Endpoint<L, P> {
    pub role: EndpointRole,
    /// This node's identity for the endpoint.
    pub local: L,
    /// The peer the endpoint is bound to, or the null sentinel.
    pub peer: P,
    pub format: FormatDescriptor,
    /// Short human-readable label.
    pub name: String,
}

/// The node's single input: addressed by a destination, fed by a source.
pub type Input = Endpoint<Destination, Source>;

/// The node's single output: addressed by a source, feeding a destination.
pub type Output = Endpoint<Source, Destination>;

impl<L: EndpointId, P: EndpointId> Endpoint<L, P> {
    fn with_role(role: EndpointRole, local: L, name: &str) -> Self {
        Self {
            role,
            local,
            peer: P::null(),
            format: FormatDescriptor::wildcard(),
            name: name.to_owned(),
        }
    }

    pub fn is_connected(&self) -> bool {
        !self.peer.is_null()
    }

    /// Drops the peer and restores the template format.
    pub(crate) fn reset(&mut self, format: &FormatDescriptor) {
        self.peer = P::null();
        self.format = format.clone();
    }
}

impl Input {
    pub fn new(local: Destination, name: &str) -> Self {
        Self::with_role(EndpointRole::Input, local, name)
    }
}

impl Output {
    pub fn new(local: Source, name: &str) -> Self {
        Self::with_role(EndpointRole::Output, local, name)
    }
}
