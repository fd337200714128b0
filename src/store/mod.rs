// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// The base append-only log engine.
pub mod append;

/// Capacity-bounded in-memory store over the red-black tree.
pub mod bounded;

/// Bloom-filtered wrapper short-circuiting negative lookups.
pub mod filtered;

/// Append-only engine with an in-memory point-lookup index.
pub mod indexed;

/// In-memory reference store (correctness oracle).
pub mod memory;

/// Segment manager rolling the log into size-bounded files.
pub mod segmented;

use crate::{
    cancel::CancellationToken,
    coding::{Decode, Encode},
};
use std::collections::BTreeMap;

/// Marker for types usable as store keys.
///
/// Keys serialize deterministically (equal keys produce identical bytes)
/// and carry a total order.
pub trait StoreKey: Encode + Decode + Ord + Clone {}

impl<T: Encode + Decode + Ord + Clone> StoreKey for T {}

/// Marker for types usable as store values.
pub trait StoreValue: Encode + Decode + Clone {}

impl<T: Encode + Decode + Clone> StoreValue for T {}

/// Common surface of every key-value engine in this crate.
///
/// Engines compose instead of inheriting: the indexed log owns a log file
/// plus an index, the filtered store owns an inner store plus a bloom
/// filter, the segmented log owns a stack of inner stores plus a factory.
///
/// Writes to one engine instance are applied in call order; a reader sees
/// either none or all of an entry's bytes. Every operation checks the
/// cancellation token before touching a file and between bulk items, and
/// fails with [`crate::Error::Canceled`] once it was canceled.
pub trait KeyValueStore<K: StoreKey, V: StoreValue> {
    /// Stores a key-value pair, overwriting logically (append-only engines
    /// keep the old bytes until compaction).
    fn set(&mut self, key: K, value: V, token: &CancellationToken) -> crate::Result<()>;

    /// Returns the most recently written value for the key.
    fn try_get(&self, key: &K, token: &CancellationToken) -> crate::Result<Option<V>>;

    /// Returns `true` if the key has a value.
    fn contains_key(&self, key: &K, token: &CancellationToken) -> crate::Result<bool> {
        Ok(self.try_get(key, token)?.is_some())
    }

    /// Removes a key.
    ///
    /// # Errors
    ///
    /// Append-only engines fail with [`crate::Error::NotSupported`].
    fn remove(&mut self, key: &K, token: &CancellationToken) -> crate::Result<()>;

    /// Stores many pairs in iteration order.
    ///
    /// Atomic per item only: cancellation or a crash mid-way leaves a clean
    /// prefix of the items applied.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::Error::InvalidArgument`] for an empty iterator.
    fn set_bulk<I: IntoIterator<Item = (K, V)>>(
        &mut self,
        items: I,
        token: &CancellationToken,
    ) -> crate::Result<()>
    where
        Self: Sized;

    /// Returns every stored entry in write order, duplicates included.
    fn get_all_items(&self, token: &CancellationToken) -> crate::Result<Vec<(K, V)>>;

    /// Drops all data.
    fn clear(&mut self, token: &CancellationToken) -> crate::Result<()>;

    /// Rewrites the store so each key appears once, keeping the
    /// last-written value per key.
    fn compact(&mut self, token: &CancellationToken) -> crate::Result<()>;
}

/// Deduplicates by key, keeping each key's last occurrence.
///
/// Survivors stay in the order in which they were last written.
pub(crate) fn dedupe_keep_last<K: Ord + Clone, V>(items: Vec<(K, V)>) -> Vec<(K, V)> {
    let mut slots: Vec<Option<(K, V)>> = Vec::with_capacity(items.len());
    let mut latest = BTreeMap::<K, usize>::new();

    for (key, value) in items {
        if let Some(stale) = latest
            .get(&key)
            .and_then(|slot| slots.get_mut(*slot))
        {
            *stale = None;
        }

        latest.insert(key.clone(), slots.len());
        slots.push(Some((key, value)));
    }

    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn store_dedupe_keeps_last_write_order() {
        let items = vec![
            (1, "a"),
            (2, "b"),
            (1, "c"),
            (3, "d"),
            (2, "e"),
        ];

        assert_eq!(
            vec![(1, "c"), (3, "d"), (2, "e")],
            dedupe_keep_last(items)
        );
    }

    #[test]
    fn store_dedupe_without_duplicates_is_identity() {
        let items = vec![(3, "x"), (1, "y"), (2, "z")];
        assert_eq!(items.clone(), dedupe_keep_last(items));
    }

    #[test]
    fn store_dedupe_empty() {
        assert!(dedupe_keep_last(Vec::<(i32, ())>::new()).is_empty());
    }
}
