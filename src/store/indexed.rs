// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{dedupe_keep_last, KeyValueStore, StoreKey, StoreValue};
use crate::{
    cancel::CancellationToken,
    coding::{Decode, Encode},
    entry::{Entry, LogReader, RecordLocator},
    file::{CreateMode, DeleteMode, StorageFile},
    fs::LockRegistry,
    index::MemIndex,
};
use std::{marker::PhantomData, path::Path};

/// Append-only engine with an in-memory index for point lookups.
///
/// The index maps each key to the locator of its latest entry, so
/// [`KeyValueStore::try_get`] seeks straight to the record instead of
/// scanning, and a miss answers without touching the file at all.
///
/// The index is not persisted; opening the store rebuilds it with one
/// sequential scan of the log.
pub struct IndexedLog<K, V> {
    file: StorageFile,
    index: MemIndex<K>,
    phantom: PhantomData<fn(V) -> V>,
}

impl<K: StoreKey, V: StoreValue> IndexedLog<K, V> {
    /// Opens (or creates) the log file at `path` and indexes its contents.
    ///
    /// The startup scan maps every key to its latest entry and cuts off a
    /// torn trailing entry left by a crashed append.
    pub fn open<P: AsRef<Path>>(path: P, registry: &LockRegistry) -> crate::Result<Self> {
        let file = StorageFile::new(path, registry);
        file.create(CreateMode::DoNothingIfExists)?;

        let buf = file.read_all()?;

        let mut reader = LogReader::<K, V>::new(&buf);
        let mut index = MemIndex::new();
        let mut valid_len = 0;

        for item in reader.by_ref() {
            let (entry, locator) = item?;
            index.set(entry.key, locator);
            valid_len = locator.end();
        }

        if reader.found_torn_tail() {
            log::warn!(
                "cutting {} torn trailing bytes off {}",
                buf.len() as u64 - valid_len,
                file.path().display(),
            );
            file.truncate(valid_len)?;
        }

        log::debug!(
            "opened indexed log at {} ({} live keys)",
            file.path().display(),
            index.len(),
        );

        Ok(Self {
            file,
            index,
            phantom: PhantomData,
        })
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Current size of the log file in bytes.
    pub fn log_size(&self) -> crate::Result<u64> {
        self.file.len()
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.index.len()
    }

    fn decode_entry_at(&self, locator: RecordLocator) -> crate::Result<Entry<K, V>> {
        let bytes = self.file.read_at(locator.offset, locator.len)?;
        Ok(Entry::decode_from(&mut std::io::Cursor::new(bytes))?)
    }
}

impl<K: StoreKey, V: StoreValue> KeyValueStore<K, V> for IndexedLog<K, V> {
    fn set(&mut self, key: K, value: V, token: &CancellationToken) -> crate::Result<()> {
        token.checkpoint()?;

        let bytes = Entry {
            key: key.clone(),
            value,
        }
        .encode_into_vec()?;

        let locator = self.file.append(&bytes)?;
        self.index.set(key, locator);

        Ok(())
    }

    fn try_get(&self, key: &K, token: &CancellationToken) -> crate::Result<Option<V>> {
        token.checkpoint()?;

        let Some(locator) = self.index.try_get(key) else {
            return Ok(None);
        };

        let entry = self.decode_entry_at(locator)?;

        Ok(Some(entry.value))
    }

    fn contains_key(&self, key: &K, token: &CancellationToken) -> crate::Result<bool> {
        token.checkpoint()?;
        Ok(self.index.contains(key))
    }

    fn remove(&mut self, _key: &K, _token: &CancellationToken) -> crate::Result<()> {
        Err(crate::Error::NotSupported(
            "append-only log does not support removal",
        ))
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

        token.checkpoint()?;

        let mut appender = self.file.appender()?;

        for (key, value) in items {
            token.checkpoint()?;

            let bytes = Entry {
                key: key.clone(),
                value,
            }
            .encode_into_vec()?;

            let locator = appender.append(&bytes)?;
            self.index.set(key, locator);
        }

        Ok(())
    }

    fn get_all_items(&self, token: &CancellationToken) -> crate::Result<Vec<(K, V)>> {
        token.checkpoint()?;

        let buf = self.file.read_all()?;

        LogReader::<K, V>::new(&buf)
            .map(|item| item.map(|(entry, _)| (entry.key, entry.value)))
            .collect()
    }

    fn clear(&mut self, token: &CancellationToken) -> crate::Result<()> {
        token.checkpoint()?;

        self.file.delete(DeleteMode::DeleteIfExists)?;
        self.index.clear();

        Ok(())
    }

    fn compact(&mut self, token: &CancellationToken) -> crate::Result<()> {
        token.checkpoint()?;

        let survivors = dedupe_keep_last(self.get_all_items(token)?);

        token.checkpoint()?;

        // Serialize survivors and re-index them at their post-rewrite offsets
        let mut buf = vec![];
        let mut index = MemIndex::new();

        for (key, value) in survivors {
            let offset = buf.len() as u64;

            Entry {
                key: key.clone(),
                value,
            }
            .encode_into(&mut buf)?;

            index.set(
                key,
                RecordLocator {
                    offset,
                    len: buf.len() as u64 - offset,
                },
            );
        }

        self.file.replace_contents(&buf)?;
        self.index = index;

        log::debug!(
            "compacted indexed log at {} to {} keys ({}B)",
            self.file.path().display(),
            self.index.len(),
            buf.len(),
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn indexed_log_rebuilds_index_on_open() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let registry = LockRegistry::new();
        let token = CancellationToken::default();
        let path = dir.path().join("kv.log");

        {
            let mut store = IndexedLog::open(&path, &registry)?;
            store.set(1i32, "one".to_string(), &token)?;
            store.set(2i32, "two".to_string(), &token)?;
            store.set(1i32, "uno".to_string(), &token)?;
        }

        let store = IndexedLog::<i32, String>::open(&path, &registry)?;

        assert_eq!(2, store.key_count());
        assert_eq!(Some("uno".to_string()), store.try_get(&1, &token)?);
        assert_eq!(Some("two".to_string()), store.try_get(&2, &token)?);

        Ok(())
    }

    #[test]
    fn indexed_log_miss_skips_file() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let registry = LockRegistry::new();
        let token = CancellationToken::default();

        let mut store = IndexedLog::open(dir.path().join("kv.log"), &registry)?;
        store.set(7i32, "seven".to_string(), &token)?;

        // Delete the file behind the store's back; a miss must not notice
        std::fs::remove_file(store.path())?;

        assert_eq!(None, store.try_get(&8, &token)?);
        assert!(!store.contains_key(&8, &token)?);

        Ok(())
    }

    #[test]
    fn indexed_log_index_follows_bulk_writes() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let registry = LockRegistry::new();
        let token = CancellationToken::default();

        let mut store = IndexedLog::open(dir.path().join("kv.log"), &registry)?;

        store.set_bulk(
            (0..100i32).map(|i| (i, format!("v{i}"))),
            &token,
        )?;

        assert_eq!(100, store.key_count());
        assert_eq!(Some("v37".to_string()), store.try_get(&37, &token)?);

        Ok(())
    }

    #[test]
    fn indexed_log_tolerates_torn_tail_on_open() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let registry = LockRegistry::new();
        let token = CancellationToken::default();
        let path = dir.path().join("kv.log");

        {
            let mut store = IndexedLog::open(&path, &registry)?;
            store.set(1i32, "one".to_string(), &token)?;
            store.set(2i32, "two".to_string(), &token)?;
        }

        let bytes = std::fs::read(&path)?;
        std::fs::write(&path, bytes.get(..bytes.len() - 1).unwrap_or_default())?;

        let store = IndexedLog::<i32, String>::open(&path, &registry)?;
        assert_eq!(1, store.key_count());
        assert_eq!(Some("one".to_string()), store.try_get(&1, &token)?);

        Ok(())
    }
}
