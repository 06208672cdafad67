//! Committed key sets of dimension entities

use crate::types::EntityKind;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

/// Keys committed per entity kind during a run
///
/// Written once per entity when it reaches `Done`, read when a dependent
/// entity builds its validator.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    keys: RwLock<HashMap<EntityKind, Arc<HashSet<String>>>>,
}

impl ReferenceIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the committed keys of an entity kind
    pub fn publish(&self, kind: EntityKind, keys: HashSet<String>) {
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, Arc::new(keys));
    }

    /// Keys of an entity kind, if it was published
    pub fn lookup(&self, kind: EntityKind) -> Option<Arc<HashSet<String>>> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
    }

    /// Published key sets for the given kinds
    pub fn snapshot(&self, kinds: &[EntityKind]) -> HashMap<EntityKind, Arc<HashSet<String>>> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        kinds
            .iter()
            .filter_map(|kind| keys.get(kind).map(|set| (*kind, Arc::clone(set))))
            .collect()
    }

    /// Whether an entity kind was published
    pub fn contains(&self, kind: EntityKind) -> bool {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&kind)
    }
}
