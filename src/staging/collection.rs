//! Ordered collections of configuration pairs
//!
//! Used for settings that come in lists, such as one strategy per
//! instrument. Membership changes and promotions of member pairs are both
//! reported through one collection-level signal.

use super::change::{EventSource, SubscriptionId};
use super::entity::ConfigEntity;
use super::gate::{gate_fn, GateContext, GateVote};
use super::pair::ConfigPair;
use crate::error::{Result, StagingError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// What changed in a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionChange {
    Added(String),
    Removed(String),
    /// An existing member promoted a new effective configuration
    ItemChanged(String),
}

impl CollectionChange {
    pub fn name(&self) -> &str {
        match self {
            CollectionChange::Added(name)
            | CollectionChange::Removed(name)
            | CollectionChange::ItemChanged(name) => name,
        }
    }

    pub fn is_structural(&self) -> bool {
        !matches!(self, CollectionChange::ItemChanged(_))
    }
}

impl fmt::Display for CollectionChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionChange::Added(name) => write!(f, "added {}", name),
            CollectionChange::Removed(name) => write!(f, "removed {}", name),
            CollectionChange::ItemChanged(name) => write!(f, "changed {}", name),
        }
    }
}

/// Insertion-ordered set of pairs of one entity kind
pub struct ConfigCollection<T: ConfigEntity> {
    name: String,
    realtime_update: AtomicBool,
    pairs: RwLock<Vec<Arc<ConfigPair<T>>>>,
    forwarding: RwLock<HashMap<String, SubscriptionId>>,
    changed: Arc<EventSource<CollectionChange>>,
}

impl<T: ConfigEntity> ConfigCollection<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            realtime_update: AtomicBool::new(true),
            pairs: RwLock::new(Vec::new()),
            forwarding: RwLock::new(HashMap::new()),
            changed: Arc::new(EventSource::new()),
        }
    }

    /// Build a collection with one pair per entity, named by its label
    pub fn from_entities(
        name: impl Into<String>,
        entities: Vec<T>,
        realtime_update: bool,
    ) -> Result<Self> {
        let collection = Self::new(name);
        collection.realtime_update.store(realtime_update, Ordering::SeqCst);
        for entity in entities {
            collection.add_entity(entity)?;
        }
        Ok(collection)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn realtime_update(&self) -> bool {
        self.realtime_update.load(Ordering::SeqCst)
    }

    /// Switch the update mode of every member and of pairs added later
    pub fn set_realtime_update(&self, enabled: bool) {
        self.realtime_update.store(enabled, Ordering::SeqCst);
        for pair in self.pairs.read().iter() {
            pair.set_realtime_update(enabled);
        }
    }

    /// Wrap `entity` in a new pair and add it
    pub fn add_entity(&self, entity: T) -> Result<Arc<ConfigPair<T>>> {
        let pair = Arc::new(
            ConfigPair::new(entity.label(), entity).with_realtime_update(self.realtime_update()),
        );
        self.add(pair.clone())?;
        Ok(pair)
    }

    /// Add a pair at the end
    ///
    /// Pair names must be unique within the collection. A member may never
    /// promote a configuration whose label differs from its pair name.
    pub fn add(&self, pair: Arc<ConfigPair<T>>) -> Result<()> {
        let name = pair.config_name().to_string();
        {
            let mut pairs = self.pairs.write();
            if pairs.iter().any(|p| p.config_name() == name) {
                return Err(StagingError::Duplicate(format!("{}/{}", self.name, name)));
            }

            let expected = name.clone();
            pair.register_gate(gate_fn(
                move |candidate: &T, _: &GateContext, errors: &mut Vec<String>| {
                    let label = candidate.label();
                    if label == expected {
                        return GateVote::Abstain;
                    }
                    errors.push(format!("{}: cannot rename to '{}'", expected, label));
                    GateVote::Deny
                },
            ));

            let events = self.changed.clone();
            let id = pair.on_configuration_changed(move |item| {
                events.emit(&CollectionChange::ItemChanged(item.to_string()));
            });
            self.forwarding.write().insert(name.clone(), id);
            pairs.push(pair);
        }

        debug!("{}: added {}", self.name, name);
        self.changed.emit(&CollectionChange::Added(name));
        Ok(())
    }

    /// Remove a pair by name
    ///
    /// The pair stops forwarding changes and its gate registrations are
    /// withdrawn.
    pub fn remove(&self, name: &str) -> Option<Arc<ConfigPair<T>>> {
        let removed = {
            let mut pairs = self.pairs.write();
            let index = pairs.iter().position(|p| p.config_name() == name)?;
            pairs.remove(index)
        };

        if let Some(id) = self.forwarding.write().remove(name) {
            removed.unsubscribe(id);
        }
        removed.clear_gates();

        info!("{}: removed {}", self.name, name);
        self.changed
            .emit(&CollectionChange::Removed(name.to_string()));
        Some(removed)
    }

    /// Snapshot of the member list in insertion order
    pub fn list(&self) -> Vec<Arc<ConfigPair<T>>> {
        self.pairs.read().clone()
    }

    pub fn len(&self) -> usize {
        self.pairs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.read().is_empty()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ConfigPair<T>>> {
        self.find(|pair| pair.config_name() == name)
    }

    /// First member matching `predicate`
    pub fn find<P>(&self, predicate: P) -> Option<Arc<ConfigPair<T>>>
    where
        P: Fn(&ConfigPair<T>) -> bool,
    {
        self.pairs.read().iter().find(|p| predicate(p)).cloned()
    }

    /// Effective configurations in insertion order
    pub fn effective_snapshots(&self) -> Vec<T> {
        self.pairs
            .read()
            .iter()
            .map(|pair| (*pair.effective()).clone())
            .collect()
    }

    /// Members whose draft differs from their effective configuration
    pub fn drifted(&self) -> Vec<Arc<ConfigPair<T>>> {
        self.pairs
            .read()
            .iter()
            .filter(|p| !p.is_effective_config_up_to_date())
            .cloned()
            .collect()
    }

    pub fn on_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&CollectionChange) + Send + Sync + 'static,
    {
        self.changed.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.changed.unsubscribe(id)
    }
}

impl<T: ConfigEntity> fmt::Debug for ConfigCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigCollection")
            .field("name", &self.name)
            .field("kind", &T::KIND)
            .field("len", &self.len())
            .finish()
    }
}
