// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{KeyValueStore, StoreKey, StoreValue};
use crate::{cancel::CancellationToken, rbtree::RedBlackTree};

/// In-memory store over a capacity-bounded red-black tree.
///
/// Same contract as [`super::memory::MemoryStore`], except the element count
/// is capped: inserting a fresh key into a full store fails with
/// [`crate::Error::CapacityExceeded`], while overwriting stays allowed.
/// `remove` is not supported by the backing tree.
#[derive(Debug)]
pub struct BoundedStore<K, V> {
    tree: RedBlackTree<K, V>,
}

impl<K: StoreKey, V: StoreValue> BoundedStore<K, V> {
    /// Creates an empty store holding at most `capacity` keys.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tree: RedBlackTree::with_capacity(capacity),
        }
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns `true` once the key cap is reached.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.tree.is_full()
    }
}

impl<K: StoreKey, V: StoreValue> KeyValueStore<K, V> for BoundedStore<K, V> {
    fn set(&mut self, key: K, value: V, token: &CancellationToken) -> crate::Result<()> {
        token.checkpoint()?;
        self.tree.set(key, value)
    }

    fn try_get(&self, key: &K, token: &CancellationToken) -> crate::Result<Option<V>> {
        token.checkpoint()?;
        Ok(self.tree.get(key).cloned())
    }

    fn contains_key(&self, key: &K, token: &CancellationToken) -> crate::Result<bool> {
        token.checkpoint()?;
        Ok(self.tree.contains(key))
    }

    fn remove(&mut self, key: &K, token: &CancellationToken) -> crate::Result<()> {
        token.checkpoint()?;
        self.tree.remove(key)
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
            self.tree.set(key, value)?;
        }

        Ok(())
    }

    fn get_all_items(&self, token: &CancellationToken) -> crate::Result<Vec<(K, V)>> {
        token.checkpoint()?;

        Ok(self
            .tree
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn clear(&mut self, token: &CancellationToken) -> crate::Result<()> {
        token.checkpoint()?;
        self.tree.clear();
        Ok(())
    }

    fn compact(&mut self, token: &CancellationToken) -> crate::Result<()> {
        // Every key is already stored exactly once
        token.checkpoint()
    }
}
