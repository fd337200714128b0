// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::entry::RecordLocator;
use std::collections::BTreeMap;

/// Ordered in-memory map from key to the on-disk location of the key's
/// latest entry.
///
/// Owned by exactly one engine and kept in lock-step with its log file:
/// after every successful write the key points at the just-written entry.
/// Purely in-memory; rebuilt by scanning the log on startup.
#[derive(Debug, Default)]
pub struct MemIndex<K> {
    items: BTreeMap<K, RecordLocator>,
}

impl<K: Ord> MemIndex<K> {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }

    /// Points `key` at `locator`, replacing any previous location.
    pub fn set(&mut self, key: K, locator: RecordLocator) {
        self.items.insert(key, locator);
    }

    /// Returns the locator of the key's latest entry, if indexed.
    #[must_use]
    pub fn try_get(&self, key: &K) -> Option<RecordLocator> {
        self.items.get(key).copied()
    }

    /// Returns `true` if the key is indexed.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.items.contains_key(key)
    }

    /// Forgets the key; returns `true` if it was indexed.
    pub fn remove(&mut self, key: &K) -> bool {
        self.items.remove(key).is_some()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Number of indexed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if no key is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
