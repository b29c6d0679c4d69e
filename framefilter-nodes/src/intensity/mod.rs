//! Channel-intensity filter node
//!
//! Adds an offset to the red, green and blue channel of every RGB32 pixel
//! and clips the result to `0..=255`. Each offset can instead be drawn at
//! random for every frame; the drawn value becomes the parameter's value.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use framefilter::{FilterNode, FlavorInfo, Host, NodeConfig, NodeKinds, Result, Roster};

mod imp;


mod state;

pub use imp::IntensityFilter;
pub use state::{BLUE, GREEN, RANDOMIZE_BLUE, RANDOMIZE_GREEN, RANDOMIZE_RED, RED, Settings};

pub const FLAVOR: &str = "RGBIntensityFilter";

pub fn flavor() -> FlavorInfo {
    FlavorInfo {
        name: FLAVOR,
        description: "Shifts the intensity of the red, green and blue channels",
        kinds: NodeKinds::FILTER,
    }
}

pub fn register(roster: &dyn Roster) -> Result<()> {
    roster.register_flavor(flavor())
}

/// Builds and registers a channel-intensity node.
pub fn create(
    host: Arc<dyn Host>,
    roster: Arc<dyn Roster>,
    config: NodeConfig,
    settings: Settings,
) -> Result<FilterNode> {
    let filter = match settings.seed {
        Some(seed) => IntensityFilter::with_seed(seed),
        None => IntensityFilter::new(),
    };
    FilterNode::builder(host, roster)
        .config(config)
        .parameters(settings.parameters())
        .build(filter)
}
