// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use framefilter::{ParameterSnapshot, ParameterValue, Transform};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::trace;

use crate::intensity::state::{CHANNELS, MAX_OFFSET, MIN_OFFSET};

/// Adds a per-channel offset to every pixel, clipping to `0..=255`.
#[derive(Debug)]
pub struct IntensityFilter {
    rng: StdRng,
}

impl IntensityFilter {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// A filter whose randomized offsets repeat for the same seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for IntensityFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for IntensityFilter {
    fn filter(&mut self, frame: &mut [u8], params: &mut ParameterSnapshot) {
        let mut offsets = [0.0; 3];
        for (offset, channel) in offsets.iter_mut().zip(CHANNELS) {
            if params.discrete(channel.randomize).unwrap_or_default() != 0 {
                let drawn = self.rng.gen_range(MIN_OFFSET as i32..=MAX_OFFSET as i32) as f32;
                trace!("{} offset randomized to {}", channel.offset_name, drawn);
                params.set(channel.offset, ParameterValue::Continuous(drawn));
            }
            *offset = params.continuous(channel.offset).unwrap_or_default();
        }
        apply_offsets(frame, offsets);
    }
}

/// Shifts each channel of every little-endian `0x00RRGGBB` word.
///
/// The fourth byte of each word is cleared.
pub(crate) fn apply_offsets(frame: &mut [u8], offsets: [f32; 3]) {
    for word in frame.chunks_exact_mut(4) {
        let pixel = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        let shifted = CHANNELS
            .iter()
            .zip(offsets)
            .fold(0, |out, (channel, offset)| {
                out | (shift_channel(pixel >> channel.shift, offset) << channel.shift)
            });
        word.copy_from_slice(&shifted.to_le_bytes());
    }
}

fn shift_channel(value: u32, offset: f32) -> u32 {
    ((value & 0xff) as f32 + offset).clamp(0.0, 255.0) as u32
}
