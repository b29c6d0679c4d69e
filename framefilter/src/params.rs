// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Timestamped control values with change broadcast.
//!
//! Each node variant declares a fixed set of [`ParameterSpec`]s. The
//! [`ParameterStore`] keeps the current value and last change time of each,
//! and pushes every accepted change to the subscribed observers. Transforms
//! read a [`ParameterSnapshot`] taken just before they run, so a controller
//! never waits on a frame being filtered.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::{Mutex, MutexGuard},
};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::{Error, Result};

/// Identifier of a parameter within one node variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamId(pub u32);

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Value representation of a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterKind {
    /// An item index into a fixed list (selectors, on/off flags).
    Discrete,
    /// A floating point value within a range.
    Continuous,
}

/// A typed parameter value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Discrete(u32),
    Continuous(f32),
}

impl ParameterValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::Discrete(_) => ParameterKind::Discrete,
            ParameterValue::Continuous(_) => ParameterKind::Continuous,
        }
    }

    pub fn as_discrete(&self) -> Option<u32> {
        match *self {
            ParameterValue::Discrete(v) => Some(v),
            ParameterValue::Continuous(_) => None,
        }
    }

    pub fn as_continuous(&self) -> Option<f32> {
        match *self {
            ParameterValue::Continuous(v) => Some(v),
            ParameterValue::Discrete(_) => None,
        }
    }

    /// Encodes the value as the 4 little-endian bytes used on the control interface.
    pub fn encode(&self) -> [u8; 4] {
        match *self {
            ParameterValue::Discrete(v) => v.to_le_bytes(),
            ParameterValue::Continuous(v) => v.to_le_bytes(),
        }
    }

    /// Decodes raw control bytes for a parameter of the given kind.
    ///
    /// Returns `None` for anything that is not exactly 4 bytes, and for
    /// continuous values that are not finite.
    pub fn decode(kind: ParameterKind, raw: &[u8]) -> Option<Self> {
        let bytes: [u8; 4] = raw.try_into().ok()?;
        match kind {
            ParameterKind::Discrete => Some(ParameterValue::Discrete(u32::from_le_bytes(bytes))),
            ParameterKind::Continuous => {
                let value = f32::from_le_bytes(bytes);
                value.is_finite().then_some(ParameterValue::Continuous(value))
            }
        }
    }
}

/// Static description of one parameter of a node variant.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParameterSpec {
    pub id: ParamId,
    pub name: &'static str,
    pub kind: ParameterKind,
    pub default: ParameterValue,
    /// Display range of a continuous parameter. Informational only.
    pub range: Option<(f32, f32)>,
    /// Item labels of a discrete parameter, indexed by value.
    pub items: &'static [&'static str],
    /// A parameter whose current value is re-broadcast whenever this one is set.
    pub dependent: Option<ParamId>,
}

impl ParameterSpec {
    pub fn discrete(
        id: ParamId,
        name: &'static str,
        items: &'static [&'static str],
        default: u32,
    ) -> Self {
        Self {
            id,
            name,
            kind: ParameterKind::Discrete,
            default: ParameterValue::Discrete(default),
            range: None,
            items,
            dependent: None,
        }
    }

    pub fn continuous(id: ParamId, name: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self {
            id,
            name,
            kind: ParameterKind::Continuous,
            default: ParameterValue::Continuous(default),
            range: Some((min, max)),
            items: &[],
            dependent: None,
        }
    }

    /// Declares `dependent` as re-broadcast whenever this parameter is set.
    pub fn with_dependent(mut self, dependent: ParamId) -> Self {
        self.dependent = Some(dependent);
        self
    }
}

/// A change notification delivered to observers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParameterChange {
    pub id: ParamId,
    /// Performance time the change takes effect.
    pub when: i64,
    pub value: ParameterValue,
}

struct Entry {
    value: ParameterValue,
    last_change: i64,
    /// Bumped on every accepted set, used to detect stale write-backs.
    generation: u64,
}

struct StoreInner {
    entries: BTreeMap<ParamId, Entry>,
    observers: Vec<Sender<ParameterChange>>,
}

impl StoreInner {
    fn broadcast(&mut self, change: ParameterChange) {
        self.observers.retain(|observer| observer.send(change).is_ok());
    }
}

/// Current values of a node's parameters.
pub struct ParameterStore {
    specs: Vec<ParameterSpec>,
    inner: Mutex<StoreInner>,
}

impl ParameterStore {
    /// Creates a store holding each spec's default, with a last change time of 0.
    pub fn new(specs: Vec<ParameterSpec>) -> Self {
        let entries = specs
            .iter()
            .map(|spec| {
                (
                    spec.id,
                    Entry {
                        value: spec.default,
                        last_change: 0,
                        generation: 0,
                    },
                )
            })
            .collect();
        Self {
            specs,
            inner: Mutex::new(StoreInner {
                entries,
                observers: Vec::new(),
            }),
        }
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        &self.specs
    }

    pub fn spec(&self, id: ParamId) -> Option<&ParameterSpec> {
        self.specs.iter().find(|spec| spec.id == id)
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            error!("Parameter store mutex poisoned, continuing with last state");
            poisoned.into_inner()
        })
    }

    /// Returns the current value of `id` and the time it last changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownParameter`] if the node has no such parameter.
    pub fn get(&self, id: ParamId) -> Result<(ParameterValue, i64)> {
        self.lock()
            .entries
            .get(&id)
            .map(|entry| (entry.value, entry.last_change))
            .ok_or(Error::UnknownParameter(id))
    }

    /// Stores `value` for `id`, effective at `when`, and broadcasts it.
    ///
    /// Absent values, values of the wrong kind and unknown ids are ignored.
    /// If the parameter declares a dependent, the dependent's current value
    /// is broadcast right after.
    pub fn set(&self, id: ParamId, when: i64, value: Option<ParameterValue>) {
        let Some(value) = value else {
            trace!("Ignoring empty value for parameter {}", id);
            return;
        };
        let Some(spec) = self.spec(id) else {
            debug!("Ignoring set of unknown parameter {}", id);
            return;
        };
        if spec.kind != value.kind() {
            debug!("Ignoring {:?} value for {:?} parameter {}", value.kind(), spec.kind, id);
            return;
        }
        let dependent = spec.dependent;

        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(&id) else {
            return;
        };
        entry.value = value;
        entry.last_change = when;
        entry.generation += 1;
        inner.broadcast(ParameterChange { id, when, value });

        if let Some(dependent) = dependent
            && let Some(entry) = inner.entries.get(&dependent)
        {
            let change = ParameterChange {
                id: dependent,
                when,
                value: entry.value,
            };
            inner.broadcast(change);
        }
    }

    /// Decodes `raw` according to the parameter's kind and sets it.
    pub fn set_raw(&self, id: ParamId, when: i64, raw: &[u8]) {
        let value = self
            .spec(id)
            .and_then(|spec| ParameterValue::decode(spec.kind, raw));
        self.set(id, when, value);
    }

    /// Registers a new observer. Dropping the receiver unsubscribes it.
    pub fn subscribe(&self) -> Receiver<ParameterChange> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.lock().observers.push(sender);
        receiver
    }

    /// Copies the current values for use by a transform.
    pub fn snapshot(&self) -> ParameterSnapshot {
        let inner = self.lock();
        let mut values = BTreeMap::new();
        let mut generations = BTreeMap::new();
        for (id, entry) in &inner.entries {
            values.insert(*id, entry.value);
            generations.insert(*id, entry.generation);
        }
        ParameterSnapshot {
            values,
            generations,
            dirty: BTreeSet::new(),
        }
    }

    /// Writes back values a transform changed in its snapshot.
    ///
    /// A value is only written back if no controller set the parameter
    /// since the snapshot was taken. Write-backs keep the last change time
    /// and are not broadcast.
    pub fn absorb(&self, snapshot: ParameterSnapshot) {
        if snapshot.dirty.is_empty() {
            return;
        }
        let mut inner = self.lock();
        for id in snapshot.dirty {
            let (Some(value), Some(generation)) =
                (snapshot.values.get(&id), snapshot.generations.get(&id))
            else {
                continue;
            };
            if let Some(entry) = inner.entries.get_mut(&id)
                && entry.generation == *generation
            {
                entry.value = *value;
            }
        }
    }
}

/// Point-in-time copy of a node's parameters handed to the transform.
#[derive(Clone, Debug, Default)]
pub struct ParameterSnapshot {
    values: BTreeMap<ParamId, ParameterValue>,
    generations: BTreeMap<ParamId, u64>,
    dirty: BTreeSet<ParamId>,
}

impl ParameterSnapshot {
    pub fn get(&self, id: ParamId) -> Option<ParameterValue> {
        self.values.get(&id).copied()
    }

    pub fn discrete(&self, id: ParamId) -> Option<u32> {
        self.get(id)?.as_discrete()
    }

    pub fn continuous(&self, id: ParamId) -> Option<f32> {
        self.get(id)?.as_continuous()
    }

    /// Replaces a value in the snapshot and marks it for write-back.
    ///
    /// Ids that are not part of the snapshot are ignored.
    pub fn set(&mut self, id: ParamId, value: ParameterValue) {
        if let Some(slot) = self.values.get_mut(&id) {
            *slot = value;
            self.dirty.insert(id);
        }
    }

    /// Builds a free-standing snapshot, for running transforms outside a node.
    pub fn from_values(values: impl IntoIterator<Item = (ParamId, ParameterValue)>) -> Self {
        let values: BTreeMap<_, _> = values.into_iter().collect();
        let generations = values.keys().map(|id| (*id, 0)).collect();
        Self {
            values,
            generations,
            dirty: BTreeSet::new(),
        }
    }
}
