// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{KeyValueStore, StoreKey, StoreValue};
use crate::{bloom::BloomFilter, cancel::CancellationToken};
use std::marker::PhantomData;

/// UTF-8 bytes of the key's display form; the default filter projection.
fn display_projection<K: std::fmt::Display>(key: &K) -> Vec<u8> {
    key.to_string().into_bytes()
}

/// Composes a bloom filter in front of an inner store.
///
/// Keys are added to the filter on every write, so a lookup whose key the
/// filter rules out returns not-found without consulting the inner store;
/// negative lookups become O(1) expected. A false positive merely falls
/// through to the inner store, which answers correctly.
///
/// The filter state is not persisted. Constructing the wrapper over a
/// persistent inner store re-populates the filter from the store's contents.
pub struct FilteredStore<K, V, S> {
    inner: S,
    filter: BloomFilter,
    projection: fn(&K) -> Vec<u8>,
    phantom: PhantomData<fn(V) -> V>,
}

impl<K: StoreKey, V: StoreValue, S: KeyValueStore<K, V>> FilteredStore<K, V, S> {
    /// Wraps `inner`, projecting keys through their display form.
    ///
    /// `expected_items` and `fp_rate` size the filter, see [`BloomFilter::new`].
    pub fn new(inner: S, expected_items: usize, fp_rate: f64) -> crate::Result<Self>
    where
        K: std::fmt::Display,
    {
        Self::with_projection(inner, expected_items, fp_rate, display_projection::<K>)
    }

    /// Wraps `inner` with a custom key-to-bytes projection.
    pub fn with_projection(
        inner: S,
        expected_items: usize,
        fp_rate: f64,
        projection: fn(&K) -> Vec<u8>,
    ) -> crate::Result<Self> {
        let mut filter = BloomFilter::new(expected_items, fp_rate)?;

        // The filter only lives in memory, so seed it from whatever the
        // inner store already holds
        let existing = inner.get_all_items(&CancellationToken::default())?;

        for (key, _) in &existing {
            filter.add(&projection(key))?;
        }

        if !existing.is_empty() {
            log::debug!("re-populated bloom filter from {} entries", existing.len());
        }

        Ok(Self {
            inner,
            filter,
            projection,
            phantom: PhantomData,
        })
    }

    /// The wrapped store.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// The bloom filter in front of the store.
    #[must_use]
    pub fn filter(&self) -> &BloomFilter {
        &self.filter
    }
}

impl<K: StoreKey, V: StoreValue, S: KeyValueStore<K, V>> KeyValueStore<K, V>
    for FilteredStore<K, V, S>
{
    fn set(&mut self, key: K, value: V, token: &CancellationToken) -> crate::Result<()> {
        token.checkpoint()?;

        self.filter.add(&(self.projection)(&key))?;
        self.inner.set(key, value, token)
    }

    fn try_get(&self, key: &K, token: &CancellationToken) -> crate::Result<Option<V>> {
        token.checkpoint()?;

        if !self.filter.contains(&(self.projection)(key)) {
            return Ok(None);
        }

        self.inner.try_get(key, token)
    }

    fn contains_key(&self, key: &K, token: &CancellationToken) -> crate::Result<bool> {
        token.checkpoint()?;

        if !self.filter.contains(&(self.projection)(key)) {
            return Ok(false);
        }

        self.inner.contains_key(key, token)
    }

    fn remove(&mut self, key: &K, token: &CancellationToken) -> crate::Result<()> {
        // A bloom filter cannot unlearn a key; the extra false positive is
        // sound either way
        self.inner.remove(key, token)
    }

    fn set_bulk<I: IntoIterator<Item = (K, V)>>(
        &mut self,
        items: I,
        token: &CancellationToken,
    ) -> crate::Result<()> {
        let items: Vec<(K, V)> = items.into_iter().collect();

        for (key, _) in &items {
            self.filter.add(&(self.projection)(key))?;
        }

        self.inner.set_bulk(items, token)
    }

    fn get_all_items(&self, token: &CancellationToken) -> crate::Result<Vec<(K, V)>> {
        self.inner.get_all_items(token)
    }

    fn clear(&mut self, token: &CancellationToken) -> crate::Result<()> {
        self.inner.clear(token)?;
        self.filter.clear();
        Ok(())
    }

    fn compact(&mut self, token: &CancellationToken) -> crate::Result<()> {
        // Compaction never introduces keys, so the filter stays sound
        self.inner.compact(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use test_log::test;

    #[test]
    fn filtered_short_circuits_misses() -> crate::Result<()> {
        let token = CancellationToken::default();

        let mut store = FilteredStore::new(MemoryStore::new(), 1_000, 0.01)?;

        for key in [10i32, 20, 30] {
            store.set(key, format!("v{key}"), &token)?;
        }

        assert!(store.contains_key(&10, &token)?);
        assert_eq!(Some("v20".to_string()), store.try_get(&20, &token)?);
        assert_eq!(None, store.try_get(&99_999, &token)?);

        Ok(())
    }

    #[test]
    fn filtered_clear_resets_filter() -> crate::Result<()> {
        let token = CancellationToken::default();

        let mut store = FilteredStore::new(MemoryStore::new(), 100, 0.01)?;

        store.set(1i32, "x".to_string(), &token)?;
        store.clear(&token)?;

        assert!(!store.filter().contains(b"1"));
        assert_eq!(None, store.try_get(&1, &token)?);

        Ok(())
    }

    #[test]
    fn filtered_custom_projection() -> crate::Result<()> {
        let token = CancellationToken::default();

        let mut store = FilteredStore::with_projection(
            MemoryStore::new(),
            100,
            0.01,
            |key: &i32| key.to_le_bytes().to_vec(),
        )?;

        store.set(512i32, "x".to_string(), &token)?;

        assert!(store.filter().contains(&512i32.to_le_bytes()));
        assert_eq!(Some("x".to_string()), store.try_get(&512, &token)?);

        Ok(())
    }
}
