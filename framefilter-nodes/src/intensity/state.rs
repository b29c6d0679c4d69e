// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use framefilter::{ParamId, ParameterSpec};

pub const RED: ParamId = ParamId(0);
pub const RANDOMIZE_RED: ParamId = ParamId(1);
pub const GREEN: ParamId = ParamId(2);
pub const RANDOMIZE_GREEN: ParamId = ParamId(3);
pub const BLUE: ParamId = ParamId(4);
pub const RANDOMIZE_BLUE: ParamId = ParamId(5);

pub(crate) const MIN_OFFSET: f32 = -255.0;
pub(crate) const MAX_OFFSET: f32 = 255.0;
pub(crate) const DEFAULT_OFFSET: f32 = 0.0;
pub(crate) const DEFAULT_RANDOMIZE: bool = false;
pub(crate) const RANDOMIZE_ITEMS: &[&str] = &["Disabled", "Enabled"];

/// One color channel of a packed `0x00RRGGBB` word.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Channel {
    pub offset: ParamId,
    pub randomize: ParamId,
    pub offset_name: &'static str,
    pub randomize_name: &'static str,
    pub shift: u32,
}

pub(crate) const CHANNELS: [Channel; 3] = [
    Channel {
        offset: RED,
        randomize: RANDOMIZE_RED,
        offset_name: "Red",
        randomize_name: "Randomize Red",
        shift: 16,
    },
    Channel {
        offset: GREEN,
        randomize: RANDOMIZE_GREEN,
        offset_name: "Green",
        randomize_name: "Randomize Green",
        shift: 8,
    },
    Channel {
        offset: BLUE,
        randomize: RANDOMIZE_BLUE,
        offset_name: "Blue",
        randomize_name: "Randomize Blue",
        shift: 0,
    },
];

/// Initial parameter values of a channel-intensity node, in red, green,
/// blue order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub offsets: [f32; 3],
    pub randomize: [bool; 3],
    /// Seed for the offset generator. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            offsets: [DEFAULT_OFFSET; 3],
            randomize: [DEFAULT_RANDOMIZE; 3],
            seed: None,
        }
    }
}

impl Settings {
    pub(crate) fn parameters(&self) -> Vec<ParameterSpec> {
        CHANNELS
            .iter()
            .zip(self.offsets.iter().zip(self.randomize))
            .flat_map(|(channel, (&offset, randomize))| {
                [
                    ParameterSpec::continuous(
                        channel.offset,
                        channel.offset_name,
                        MIN_OFFSET,
                        MAX_OFFSET,
                        offset,
                    ),
                    ParameterSpec::discrete(
                        channel.randomize,
                        channel.randomize_name,
                        RANDOMIZE_ITEMS,
                        u32::from(randomize),
                    )
                    .with_dependent(channel.offset),
                ]
            })
            .collect()
    }
}
