// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{dedupe_keep_last, KeyValueStore, StoreKey, StoreValue};
use crate::{
    cancel::CancellationToken,
    coding::Encode,
    entry::{Entry, LogReader, RecordLocator},
    file::{CreateMode, DeleteMode, StorageFile},
    fs::LockRegistry,
};
use std::{marker::PhantomData, path::Path};

/// The base append-only key-value engine.
///
/// Every write appends one entry to a single log file; reads scan the whole
/// log and resolve duplicates in favor of the latest write. Removal is not
/// supported; space is reclaimed by [`KeyValueStore::compact`], which keeps
/// each key's last value and atomically replaces the log.
pub struct AppendLog<K, V> {
    file: StorageFile,
    phantom: PhantomData<fn(K, V) -> (K, V)>,
}

impl<K: StoreKey, V: StoreValue> AppendLog<K, V> {
    /// Opens (or creates) the log file at `path`.
    ///
    /// Parent directories are created on demand. Existing contents are kept,
    /// except for a torn trailing entry left by a crashed append, which is
    /// cut off so later appends cannot land behind unreadable bytes.
    pub fn open<P: AsRef<Path>>(path: P, registry: &LockRegistry) -> crate::Result<Self> {
        let file = StorageFile::new(path, registry);
        file.create(CreateMode::DoNothingIfExists)?;

        repair_torn_tail::<K, V>(&file)?;

        log::debug!("opened append log at {}", file.path().display());

        Ok(Self {
            file,
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

    fn read_entries(&self) -> crate::Result<Vec<(Entry<K, V>, RecordLocator)>> {
        let buf = self.file.read_all()?;
        LogReader::new(&buf).collect()
    }
}

/// Scans the log once and drops a torn trailing entry, if any.
///
/// A decode failure that is not a clean truncation of the tail is
/// propagated; only a crashed append is repaired silently.
pub(crate) fn repair_torn_tail<K: StoreKey, V: StoreValue>(
    file: &StorageFile,
) -> crate::Result<()> {
    let buf = file.read_all()?;

    let mut reader = LogReader::<K, V>::new(&buf);
    let mut valid_len = 0;

    for item in reader.by_ref() {
        let (_, locator) = item?;
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

    Ok(())
}

impl<K: StoreKey, V: StoreValue> KeyValueStore<K, V> for AppendLog<K, V> {
    fn set(&mut self, key: K, value: V, token: &CancellationToken) -> crate::Result<()> {
        token.checkpoint()?;

        let bytes = Entry { key, value }.encode_into_vec()?;
        let locator = self.file.append(&bytes)?;

        log::trace!(
            "appended {}B entry at offset {} in {}",
            locator.len,
            locator.offset,
            self.file.path().display(),
        );

        Ok(())
    }

    fn try_get(&self, key: &K, token: &CancellationToken) -> crate::Result<Option<V>> {
        token.checkpoint()?;

        let mut found = None;

        for item in LogReader::<K, V>::new(&self.file.read_all()?) {
            let (entry, _) = item?;

            if entry.key == *key {
                // Scan order is write order, so a later match wins
                found = Some(entry.value);
            }
        }

        Ok(found)
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

            let bytes = Entry { key, value }.encode_into_vec()?;
            appender.append(&bytes)?;
        }

        Ok(())
    }

    fn get_all_items(&self, token: &CancellationToken) -> crate::Result<Vec<(K, V)>> {
        token.checkpoint()?;

        Ok(self
            .read_entries()?
            .into_iter()
            .map(|(entry, _)| (entry.key, entry.value))
            .collect())
    }

    fn clear(&mut self, token: &CancellationToken) -> crate::Result<()> {
        token.checkpoint()?;

        self.file.delete(DeleteMode::DeleteIfExists)?;

        log::debug!("cleared append log at {}", self.file.path().display());

        Ok(())
    }

    fn compact(&mut self, token: &CancellationToken) -> crate::Result<()> {
        token.checkpoint()?;

        let items: Vec<(K, V)> = self
            .read_entries()?
            .into_iter()
            .map(|(entry, _)| (entry.key, entry.value))
            .collect();

        let size_before = items.len();
        let survivors = dedupe_keep_last(items);
        let survivor_count = survivors.len();

        token.checkpoint()?;

        let mut buf = vec![];
        for (key, value) in survivors {
            Entry { key, value }.encode_into(&mut buf)?;
        }

        self.file.replace_contents(&buf)?;

        log::debug!(
            "compacted {size_before} down to {survivor_count} entries ({}B)",
            buf.len(),
        );

        Ok(())
    }
}
