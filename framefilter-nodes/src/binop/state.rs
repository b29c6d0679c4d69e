// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use framefilter::{ParamId, ParameterSpec};

/// Selects the operator combining the current frame with the previous one.
pub const OPERATOR: ParamId = ParamId(0);

pub(crate) const DEFAULT_OPERATOR: Operator = Operator::And;
pub(crate) const OPERATOR_NAME: &str = "Bin operator";
pub(crate) const OPERATOR_ITEMS: &[&str] = &["AND", "OR", "XOR"];

/// Bitwise operator applied word by word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    #[default]
    And,
    Or,
    Xor,
}

impl Operator {
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Operator::And),
            1 => Some(Operator::Or),
            2 => Some(Operator::Xor),
            _ => None,
        }
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn label(self) -> &'static str {
        OPERATOR_ITEMS[self as usize]
    }

    pub fn apply(self, current: u32, previous: u32) -> u32 {
        match self {
            Operator::And => current & previous,
            Operator::Or => current | previous,
            Operator::Xor => current ^ previous,
        }
    }
}

/// Initial parameter values of a boolean-combine node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub operator: Operator,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            operator: DEFAULT_OPERATOR,
        }
    }
}

impl Settings {
    pub(crate) fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::discrete(
            OPERATOR,
            OPERATOR_NAME,
            OPERATOR_ITEMS,
            self.operator.index(),
        )]
    }
}

/// Frame history carried from one buffer to the next.
#[derive(Debug, Default)]
pub(crate) struct State {
    /// The previous unmodified input frame. Zeroed before the first one.
    pub previous: Vec<u8>,
    /// Copy of the frame being filtered, swapped into `previous` afterwards.
    pub scratch: Vec<u8>,
}

impl State {
    pub fn reset(&mut self, frame_size: usize) {
        self.previous.clear();
        self.previous.resize(frame_size, 0);
        self.scratch.clear();
    }
}
