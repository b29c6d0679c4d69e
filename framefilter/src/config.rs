// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Node configuration.
//!
//! Every field has a default, so a node can be built from
//! `NodeConfig::default()` or from a partial JSON document.

use serde::{Deserialize, Serialize};

use crate::{Result, format::PreferredFormat};

pub const DEFAULT_NODE_NAME: &str = "Filter";
pub const DEFAULT_INPUT_NAME: &str = "Video Input";
pub const DEFAULT_OUTPUT_NAME: &str = "Video Output";
/// Fixed scheduling overhead reported on top of the event latency, in microseconds.
pub const DEFAULT_SCHEDULING_LATENCY_US: i64 = 2_000;

/// Scheduling priority requested for a node's control thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ThreadPriority {
    RealTime,
    #[default]
    High,
    Normal,
}

impl ThreadPriority {
    pub fn description(&self) -> &'static str {
        match self {
            ThreadPriority::RealTime => "Real-time (< 10ms latency, time-constrained)",
            ThreadPriority::High => "High priority (< 33ms latency, elevated)",
            ThreadPriority::Normal => "Normal priority (no strict latency)",
        }
    }
}

/// How a node trades precision against latency when it falls behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RunMode {
    /// Buffers are processed as fast as they arrive; time is driven by buffer stamps.
    Offline,
    #[default]
    DecreasePrecision,
    IncreaseLatency,
    DropData,
    Recording,
}

/// What happens to buffers that arrive while the node is not running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StoppedBufferPolicy {
    /// Return them to their pool.
    #[default]
    Recycle,
    /// Forward them downstream without filtering.
    Bypass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub name: String,
    pub input_name: String,
    pub output_name: String,
    /// Defaults used to fill wildcard format fields.
    pub preferred: PreferredFormat,
    pub scheduling_latency_us: i64,
    pub priority: ThreadPriority,
    pub stopped_buffers: StoppedBufferPolicy,
    pub run_mode: RunMode,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NODE_NAME.to_owned(),
            input_name: DEFAULT_INPUT_NAME.to_owned(),
            output_name: DEFAULT_OUTPUT_NAME.to_owned(),
            preferred: PreferredFormat::default(),
            scheduling_latency_us: DEFAULT_SCHEDULING_LATENCY_US,
            priority: ThreadPriority::default(),
            stopped_buffers: StoppedBufferPolicy::default(),
            run_mode: RunMode::default(),
        }
    }
}

impl NodeConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = NodeConfig::from_json(
            r#"{ "name": "XOR", "preferred": { "width": 640 }, "stopped_buffers": "Bypass" }"#,
        )
        .unwrap();
        assert_eq!(config.name, "XOR");
        assert_eq!(config.preferred.width, 640);
        assert_eq!(config.preferred.height, 240);
        assert_eq!(config.stopped_buffers, StoppedBufferPolicy::Bypass);
        assert_eq!(config.scheduling_latency_us, DEFAULT_SCHEDULING_LATENCY_US);
        assert_eq!(config.run_mode, RunMode::DecreasePrecision);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            NodeConfig::from_json("{ \"name\": 3 }"),
            Err(Error::Config(_))
        ));
    }
}
