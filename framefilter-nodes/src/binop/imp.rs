// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use framefilter::{FormatDescriptor, ParameterSnapshot, Transform};
use tracing::{debug, trace};

use crate::binop::state::{OPERATOR, Operator, State};

/// Combines each frame with the previous input frame.
#[derive(Debug, Default)]
pub struct BinopFilter {
    state: State,
}

impl BinopFilter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transform for BinopFilter {
    fn init(&mut self, format: &FormatDescriptor) {
        let frame_size = format.frame_size().unwrap_or(0);
        debug!("Resetting frame history to {} bytes", frame_size);
        self.state.reset(frame_size);
    }

    fn filter(&mut self, frame: &mut [u8], params: &mut ParameterSnapshot) {
        let state = &mut self.state;
        if state.previous.len() != frame.len() {
            trace!(
                "Frame size changed from {} to {} bytes, clearing history",
                state.previous.len(),
                frame.len()
            );
            state.reset(frame.len());
        }

        state.scratch.clear();
        state.scratch.extend_from_slice(frame);

        let index = params.discrete(OPERATOR).unwrap_or_default();
        match Operator::from_index(index) {
            Some(op) => combine(op, frame, &state.previous),
            None => trace!("Unknown operator index {}, frame passed through", index),
        }

        std::mem::swap(&mut state.previous, &mut state.scratch);
    }
}

/// Applies `op` to each little-endian 32-bit word of `frame` and `previous`.
///
/// Trailing bytes that do not fill a whole word are left alone.
pub(crate) fn combine(op: Operator, frame: &mut [u8], previous: &[u8]) {
    for (word, prev) in frame.chunks_exact_mut(4).zip(previous.chunks_exact(4)) {
        let current = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        let prev = u32::from_le_bytes([prev[0], prev[1], prev[2], prev[3]]);
        word.copy_from_slice(&op.apply(current, prev).to_le_bytes());
    }
}
