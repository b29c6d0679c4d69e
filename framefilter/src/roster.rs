// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Registration of nodes and node flavors with the media roster.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use tracing::{error, info};

use crate::{Error, Result, endpoint::NodeId};

/// Roles a registered node implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeKinds {
    pub consumer: bool,
    pub producer: bool,
    pub controllable: bool,
}

impl NodeKinds {
    pub const FILTER: NodeKinds = NodeKinds {
        consumer: true,
        producer: true,
        controllable: true,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub kinds: NodeKinds,
}

/// A kind of node an add-on can instantiate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlavorInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub kinds: NodeKinds,
}

pub trait Roster: Send + Sync {
    fn register_flavor(&self, flavor: FlavorInfo) -> Result<()>;

    fn register_node(&self, info: NodeInfo) -> Result<()>;

    fn unregister_node(&self, id: NodeId) -> Result<()>;
}

/// In-process roster backed by a map.
#[derive(Debug, Default)]
pub struct LocalRoster {
    nodes: Mutex<HashMap<NodeId, NodeInfo>>,
    flavors: Mutex<Vec<FlavorInfo>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| {
        error!("Roster mutex poisoned");
        Error::Other("Roster mutex poisoned".to_owned())
    })
}

impl LocalRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> Vec<NodeInfo> {
        lock(&self.nodes)
            .map(|nodes| nodes.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn flavors(&self) -> Vec<FlavorInfo> {
        lock(&self.flavors)
            .map(|flavors| flavors.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        lock(&self.nodes)
            .map(|nodes| nodes.contains_key(&id))
            .unwrap_or(false)
    }
}

impl Roster for LocalRoster {
    fn register_flavor(&self, flavor: FlavorInfo) -> Result<()> {
        let mut flavors = lock(&self.flavors)?;
        if flavors.iter().any(|f| f.name == flavor.name) {
            return Err(Error::Other(format!("Flavor {} already registered", flavor.name)));
        }
        info!("Registered flavor {}", flavor.name);
        flavors.push(flavor);
        Ok(())
    }

    fn register_node(&self, info: NodeInfo) -> Result<()> {
        let mut nodes = lock(&self.nodes)?;
        if nodes.contains_key(&info.id) {
            return Err(Error::Other(format!("Node {} already registered", info.id)));
        }
        info!("Registered node {} ({})", info.name, info.id);
        nodes.insert(info.id, info);
        Ok(())
    }

    fn unregister_node(&self, id: NodeId) -> Result<()> {
        let mut nodes = lock(&self.nodes)?;
        match nodes.remove(&id) {
            Some(info) => {
                info!("Unregistered node {} ({})", info.name, id);
                Ok(())
            }
            None => Err(Error::Other(format!("Node {id} is not registered"))),
        }
    }
}
