//! Typed name → object registry.
//!
//! A single-writer, multi-reader store: all mutation happens on the control
//! plane while workers are parked at the pause barrier, so the backing map
//! needs no internal locking beyond what lets a worker thread read it
//! concurrently with other readers. Keyed maps use `FxHashMap` for the same
//! reason the rest of this crate's hot internal maps do.

use fxhash::FxHashMap;
use std::hash::Hash;

use crate::error::EngineError;

/// A typed namespace: one registry per `K` (e.g. one for module names).
///
/// Insertion rejects duplicate names with [`EngineError::NameConflict`]
/// rather than overwriting the existing entry.
pub struct Namespace<K, V> {
    entries: FxHashMap<K, V>,
}

impl<K, V> Namespace<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Display,
{
    /// Creates an empty namespace.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    /// Inserts `value` under `key`, failing if the key is already taken.
    pub fn insert(&mut self, key: K, value: V) -> Result<(), EngineError> {
        if self.entries.contains_key(&key) {
            return Err(EngineError::NameConflict(key.to_string()));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    /// Looks up an entry by key.
    #[must_use]
    pub fn lookup(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Looks up an entry by key, mutably.
    pub fn lookup_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// Removes and returns an entry, if present.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    /// Returns whether `key` is currently registered.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the namespace is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates all entries exactly once. Order is hash-bucket order, not
    /// insertion order — callers must not depend on a stable ordering.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    /// Iterates all keys. See [`Namespace::iter`] for the ordering caveat.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }
}

impl<K, V> Default for Namespace<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Display,
{
    fn default() -> Self {
        Self::new()
    }
}
