//! Boolean-combine filter node
//!
//! Combines every frame with the previous input frame using a bitwise
//! operator, word by word. With XOR the output shows what changed between
//! two frames; AND and OR keep the bits the two frames share or add up.
//!
//! ## Responsibilities
//! - Keeps a copy of the previous unmodified input frame
//! - Applies the selected operator to each 32-bit pixel word
//! - Resets the history whenever the input format is renegotiated
//!
//! ## Parameters
//! - `Bin operator` ([`OPERATOR`]): discrete, `AND` / `OR` / `XOR`

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use framefilter::{FilterNode, FlavorInfo, Host, NodeConfig, NodeKinds, Result, Roster};

/// Transform and word-wise combine
mod imp;


/// Parameter ids, operator selection and frame history
mod state;

pub use imp::BinopFilter;
pub use state::{OPERATOR, Operator, Settings};

/// Flavor name under which the node is announced.
pub const FLAVOR: &str = "FrameBinOpFilter";

pub fn flavor() -> FlavorInfo {
    FlavorInfo {
        name: FLAVOR,
        description: "Combines each frame with the previous one using AND, OR or XOR",
        kinds: NodeKinds::FILTER,
    }
}

/// Announces the flavor to `roster`.
pub fn register(roster: &dyn Roster) -> Result<()> {
    roster.register_flavor(flavor())
}

/// Builds and registers a boolean-combine node.
///
/// # Errors
///
/// Fails if the roster refuses the node or its control thread cannot start.
pub fn create(
    host: Arc<dyn Host>,
    roster: Arc<dyn Roster>,
    config: NodeConfig,
    settings: Settings,
) -> Result<FilterNode> {
    FilterNode::builder(host, roster)
        .config(config)
        .parameters(settings.parameters())
        .build(BinopFilter::new())
}
