// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Concrete filter nodes built on [`framefilter`].
//!
//! - [`binop`]: combines each frame with the previous one (AND, OR, XOR)
//! - [`intensity`]: shifts the red, green and blue channels by an offset,
//!   optionally randomized on every frame
//!
//! [`register`] announces both flavors to a roster; [`create_node`] builds a
//! node of either flavor by name with default settings.

use std::sync::Arc;

use framefilter::{Error, FilterNode, Host, NodeConfig, Result, Roster};

pub mod binop;
pub mod intensity;

#[cfg(test)]
mod test_support;

/// Announces every flavor of this crate to `roster`.
pub fn register(roster: &dyn Roster) -> Result<()> {
    binop::register(roster)?;
    intensity::register(roster)
}

/// Builds a node of the named flavor with default settings.
///
/// # Errors
///
/// Returns [`Error::Other`] for an unknown flavor, otherwise whatever
/// building the node returns.
pub fn create_node(
    flavor: &str,
    host: Arc<dyn Host>,
    roster: Arc<dyn Roster>,
    config: NodeConfig,
) -> Result<FilterNode> {
    match flavor {
        binop::FLAVOR => binop::create(host, roster, config, binop::Settings::default()),
        intensity::FLAVOR => {
            intensity::create(host, roster, config, intensity::Settings::default())
        }
        other => Err(Error::Other(format!("Unknown flavor {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use framefilter::LocalRoster;

    use super::*;

    #[test]
    fn register_announces_both_flavors_once() {
        let roster = LocalRoster::new();
        register(&roster).unwrap();

        let names: Vec<_> = roster.flavors().iter().map(|f| f.name).collect();
        assert_eq!(names, vec![binop::FLAVOR, intensity::FLAVOR]);
        assert!(register(&roster).is_err());
    }

    #[test]
    fn unknown_flavor_is_rejected() {
        let (host, _deliveries) = framefilter::LoopbackHost::new(1);
        let roster = Arc::new(LocalRoster::new());
        let result = create_node("Sepia", Arc::new(host), roster.clone(), NodeConfig::default());
        assert!(matches!(result, Err(Error::Other(_))));
        assert!(roster.nodes().is_empty());
    }

    #[test]
    fn created_nodes_register_under_their_config_name() {
        let (host, _deliveries) = framefilter::LoopbackHost::new(1);
        let host = Arc::new(host);
        let roster = Arc::new(LocalRoster::new());

        let binop = create_node(
            binop::FLAVOR,
            host.clone(),
            roster.clone(),
            NodeConfig::default().with_name("Combine"),
        )
        .unwrap();
        let intensity = create_node(
            intensity::FLAVOR,
            host,
            roster.clone(),
            NodeConfig::default().with_name("Intensity"),
        )
        .unwrap();

        assert!(roster.contains(binop.id()));
        assert!(roster.contains(intensity.id()));
        assert_eq!(intensity.name(), "Intensity");

        binop.shutdown().unwrap();
        assert!(!roster.contains(binop.id()));
    }
}
