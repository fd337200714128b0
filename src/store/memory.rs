// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{KeyValueStore, StoreKey, StoreValue};
use crate::cancel::CancellationToken;
use std::collections::BTreeMap;

/// Purely in-memory reference implementation of the store contract.
///
/// Holds an ordered map, so [`KeyValueStore::get_all_items`] enumerates in
/// key order and every key appears exactly once. Nothing persists; the test
/// suites use it as a correctness oracle for the log-backed engines.
#[derive(Debug, Default)]
pub struct MemoryStore<K, V> {
    items: BTreeMap<K, V>,
}

impl<K: StoreKey, V: StoreValue> MemoryStore<K, V> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K: StoreKey, V: StoreValue> KeyValueStore<K, V> for MemoryStore<K, V> {
    fn set(&mut self, key: K, value: V, token: &CancellationToken) -> crate::Result<()> {
        token.checkpoint()?;
        self.items.insert(key, value);
        Ok(())
    }

    fn try_get(&self, key: &K, token: &CancellationToken) -> crate::Result<Option<V>> {
        token.checkpoint()?;
        Ok(self.items.get(key).cloned())
    }

    fn contains_key(&self, key: &K, token: &CancellationToken) -> crate::Result<bool> {
        token.checkpoint()?;
        Ok(self.items.contains_key(key))
    }

    fn remove(&mut self, key: &K, token: &CancellationToken) -> crate::Result<()> {
        token.checkpoint()?;
        self.items.remove(key);
        Ok(())
    }

    fn set_bulk<I: IntoIterator<Item = (K, V)>>(
        &mut self,
        items: I,
        token: &CancellationToken,
    ) -> crate::Result<()> {
        let mut items = items.into_iter().peekable();

        if items.peek().is_none() {
            return Err(crate::Error::InvalidArgument(
                "bulk write needs at least one item",
            ));
        }

        for (key, value) in items {
            token.checkpoint()?;
            self.items.insert(key, value);
        }

        Ok(())
    }

    fn get_all_items(&self, token: &CancellationToken) -> crate::Result<Vec<(K, V)>> {
        token.checkpoint()?;

        Ok(self
            .items
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn clear(&mut self, token: &CancellationToken) -> crate::Result<()> {
        token.checkpoint()?;
        self.items.clear();
        Ok(())
    }

    fn compact(&mut self, token: &CancellationToken) -> crate::Result<()> {
        // Every key is already stored exactly once
        token.checkpoint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn memory_store_overwrite_and_remove() -> crate::Result<()> {
        let token = CancellationToken::default();
        let mut store = MemoryStore::new();

        store.set(1i32, "a".to_string(), &token)?;
        store.set(1i32, "b".to_string(), &token)?;
        assert_eq!(Some("b".to_string()), store.try_get(&1, &token)?);

        store.remove(&1, &token)?;
        assert_eq!(None, store.try_get(&1, &token)?);
        assert!(store.is_empty());

        Ok(())
    }

    #[test]
    fn memory_store_items_in_key_order() -> crate::Result<()> {
        let token = CancellationToken::default();
        let mut store = MemoryStore::new();

        for key in [3i32, 1, 2] {
            store.set(key, key.to_string(), &token)?;
        }

        let keys: Vec<i32> = store
            .get_all_items(&token)?
            .into_iter()
            .map(|(k, _)| k)
            .collect();

        assert_eq!(vec![1, 2, 3], keys);

        Ok(())
    }
}
