// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{dedupe_keep_last, KeyValueStore, StoreKey, StoreValue};
use crate::{
    cancel::CancellationToken,
    coding::Encode,
    entry::Entry,
    time::{timestamp_now, TIMESTAMP_DIGITS},
};
use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
};

/// One segment file and the engine bound to it.
struct Segment<S> {
    path: PathBuf,
    store: S,
}

/// Rolls an append-only log into size-bounded immutable segments.
///
/// The newest segment is the only writable one; once a write would not
/// belong in it anymore it is sealed in place and a fresh segment becomes
/// current. Reads walk the stack newest to oldest and stop at the first hit,
/// which yields last-write-wins across segments because newer writes always
/// live in newer segments.
///
/// Segment files are named `<prefix>_segment_<timestamp>.log` with a 17-digit
/// UTC `yyyyMMddHHmmssfff` timestamp, so lexicographic file name order equals
/// write order. Files not matching that pattern are ignored on startup.
///
/// A factory produces the inner engine for each segment file, so the
/// segments can be plain [`super::append::AppendLog`]s, indexed logs, or any
/// other [`KeyValueStore`] bound to a single file.
pub struct SegmentedLog<K, V, S, F> {
    dir: PathBuf,
    prefix: String,
    max_segment_size: u64,
    factory: F,

    /// Oldest to newest; the last one is current (writable)
    segments: Vec<Segment<S>>,

    /// Highest timestamp handed out so far, so same-millisecond rolls
    /// still produce strictly increasing names
    last_timestamp: u64,

    phantom: PhantomData<fn(K, V) -> (K, V)>,
}

impl<K, V, S, F> SegmentedLog<K, V, S, F>
where
    K: StoreKey,
    V: StoreValue,
    S: KeyValueStore<K, V>,
    F: Fn(&Path) -> crate::Result<S>,
{
    /// Opens (or creates) a segmented log in `dir`.
    ///
    /// Existing segment files with a matching name are adopted in file name
    /// order; otherwise a fresh current segment is started.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` for an empty prefix or a zero segment
    /// size cap.
    pub fn open<P: AsRef<Path>>(
        dir: P,
        prefix: &str,
        max_segment_size: u64,
        factory: F,
    ) -> crate::Result<Self> {
        if prefix.is_empty() {
            return Err(crate::Error::InvalidArgument(
                "segment file prefix must not be empty",
            ));
        }
        if max_segment_size == 0 {
            return Err(crate::Error::InvalidArgument(
                "max segment size must be positive",
            ));
        }

        let dir = crate::path::absolute_path(dir);
        std::fs::create_dir_all(&dir)?;

        let mut found: Vec<(u64, PathBuf)> = vec![];

        for dir_entry in std::fs::read_dir(&dir)? {
            let dir_entry = dir_entry?;

            let file_name = dir_entry.file_name();

            if let Some(timestamp) = file_name
                .to_str()
                .and_then(|name| parse_segment_timestamp(name, prefix))
            {
                found.push((timestamp, dir_entry.path()));
            }
        }

        // Fixed-width digit strings: numeric order is file name order
        found.sort();

        let last_timestamp = found.last().map_or(0, |(timestamp, _)| *timestamp);

        let mut segments = Vec::with_capacity(found.len().max(1));

        for (_, path) in found {
            let store = factory(&path)?;
            segments.push(Segment { path, store });
        }

        log::debug!(
            "opened segmented log in {} with {} existing segment(s)",
            dir.display(),
            segments.len(),
        );

        let mut log = Self {
            dir,
            prefix: prefix.to_string(),
            max_segment_size,
            factory,
            segments,
            last_timestamp,
            phantom: PhantomData,
        };

        if log.segments.is_empty() {
            log.push_segment()?;
        }

        Ok(log)
    }

    /// Number of segments, including the current one.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Paths of all segments, oldest first.
    #[must_use]
    pub fn segment_paths(&self) -> Vec<PathBuf> {
        self.segments.iter().map(|s| s.path.clone()).collect()
    }

    /// The configured segment size cap in bytes.
    #[must_use]
    pub fn max_segment_size(&self) -> u64 {
        self.max_segment_size
    }

    fn file_size(path: &Path) -> crate::Result<u64> {
        match std::fs::metadata(path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn segment(&self, idx: usize) -> &Segment<S> {
        #[allow(clippy::expect_used)]
        self.segments.get(idx).expect("segment index should be valid")
    }

    fn current_mut(&mut self) -> &mut Segment<S> {
        #[allow(clippy::expect_used)]
        self.segments
            .last_mut()
            .expect("there should always be a current segment")
    }

    fn current_size(&self) -> crate::Result<u64> {
        #[allow(clippy::expect_used)]
        let current = self
            .segments
            .last()
            .expect("there should always be a current segment");

        Self::file_size(&current.path)
    }

    /// Seals the current segment and starts a fresh one.
    fn push_segment(&mut self) -> crate::Result<()> {
        let timestamp = timestamp_now().max(self.last_timestamp + 1);
        self.last_timestamp = timestamp;

        let path = self.dir.join(format!(
            "{}_segment_{:0width$}.log",
            self.prefix,
            timestamp,
            width = TIMESTAMP_DIGITS,
        ));

        log::debug!("rolling to new segment {}", path.display());

        let store = (self.factory)(&path)?;
        self.segments.push(Segment { path, store });

        Ok(())
    }

    /// Repacks adjacent runs of undersized sealed segments.
    ///
    /// A run is rewritten only when packing its entries into cap-sized
    /// segments reduces the file count; the repacked files reuse the oldest
    /// names of the run so file name order keeps equalling write order.
    /// Runs automatically at the end of [`KeyValueStore::compact`], and is
    /// worth calling on its own after reopening a log with a larger size
    /// cap.
    pub fn merge(&mut self, token: &CancellationToken) -> crate::Result<()> {
        // Need at least two sealed segments besides the current one
        if self.segments.len() < 3 {
            return Ok(());
        }

        let sealed_count = self.segments.len() - 1;

        let mut runs: Vec<(usize, usize)> = vec![];
        let mut run_start = None;

        for idx in 0..sealed_count {
            if Self::file_size(&self.segment(idx).path)? < self.max_segment_size {
                run_start.get_or_insert(idx);
            } else if let Some(start) = run_start.take() {
                if idx - start >= 2 {
                    runs.push((start, idx));
                }
            }
        }
        if let Some(start) = run_start {
            if sealed_count - start >= 2 {
                runs.push((start, sealed_count));
            }
        }

        // Back to front so earlier run indices survive the splicing
        for (start, end) in runs.into_iter().rev() {
            self.merge_run(start, end, token)?;
        }

        Ok(())
    }

    /// Concatenates the live contents of `segments[start..end]` into packed
    /// segments, if that reduces the file count.
    fn merge_run(
        &mut self,
        start: usize,
        end: usize,
        token: &CancellationToken,
    ) -> crate::Result<()> {
        let mut groups: Vec<Vec<(K, V)>> = vec![];
        let mut group: Vec<(K, V)> = vec![];
        let mut group_size = 0;

        for idx in start..end {
            token.checkpoint()?;

            for (key, value) in self.segment(idx).store.get_all_items(token)? {
                let size = Entry {
                    key: key.clone(),
                    value: value.clone(),
                }
                .encode_into_vec()?
                .len() as u64;

                if group_size + size > self.max_segment_size && !group.is_empty() {
                    groups.push(std::mem::take(&mut group));
                    group_size = 0;
                }

                group.push((key, value));
                group_size += size;
            }
        }
        if !group.is_empty() {
            groups.push(group);
        }

        if groups.len() >= end - start {
            return Ok(());
        }

        log::debug!(
            "merging {} undersized segments into {}",
            end - start,
            groups.len(),
        );

        let run_paths: Vec<PathBuf> = (start..end)
            .map(|idx| self.segment(idx).path.clone())
            .collect();

        // Retire the run's files, then rebuild packed ones under the run's
        // oldest names
        for idx in start..end {
            token.checkpoint()?;

            #[allow(clippy::expect_used)]
            let segment = self.segments.get_mut(idx).expect("run index should be valid");

            segment.store.clear(token)?;
        }

        let mut packed = Vec::with_capacity(groups.len());

        for (group, path) in groups.into_iter().zip(run_paths) {
            token.checkpoint()?;

            let mut store = (self.factory)(&path)?;
            store.set_bulk(group, token)?;

            packed.push(Segment { path, store });
        }

        let _ = self.segments.splice(start..end, packed);

        Ok(())
    }
}

impl<K, V, S, F> KeyValueStore<K, V> for SegmentedLog<K, V, S, F>
where
    K: StoreKey,
    V: StoreValue,
    S: KeyValueStore<K, V>,
    F: Fn(&Path) -> crate::Result<S>,
{
    fn set(&mut self, key: K, value: V, token: &CancellationToken) -> crate::Result<()> {
        token.checkpoint()?;

        if self.current_size()? >= self.max_segment_size {
            self.push_segment()?;
        }

        self.current_mut().store.set(key, value, token)
    }

    fn try_get(&self, key: &K, token: &CancellationToken) -> crate::Result<Option<V>> {
        token.checkpoint()?;

        // Newest first, so the latest write for the key wins
        for segment in self.segments.iter().rev() {
            if let Some(value) = segment.store.try_get(key, token)? {
                return Ok(Some(value));
            }
        }

        Ok(None)
    }

    fn contains_key(&self, key: &K, token: &CancellationToken) -> crate::Result<bool> {
        token.checkpoint()?;

        for segment in self.segments.iter().rev() {
            if segment.store.contains_key(key, token)? {
                return Ok(true);
            }
        }

        Ok(false)
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

        let mut current_size = self.current_size()?;

        for (key, value) in items {
            token.checkpoint()?;

            // Pre-size via a scratch encode, so no sealed segment ever
            // exceeds the cap
            let size = Entry {
                key: key.clone(),
                value: value.clone(),
            }
            .encode_into_vec()?
            .len() as u64;

            if size > self.max_segment_size {
                return Err(crate::Error::CapacityExceeded);
            }

            if current_size + size > self.max_segment_size {
                self.push_segment()?;
                current_size = 0;
            }

            self.current_mut().store.set(key, value, token)?;
            current_size += size;
        }

        Ok(())
    }

    fn get_all_items(&self, token: &CancellationToken) -> crate::Result<Vec<(K, V)>> {
        token.checkpoint()?;

        let mut items = vec![];

        // Oldest first: concatenation preserves global write order
        for segment in &self.segments {
            items.extend(segment.store.get_all_items(token)?);
        }

        Ok(items)
    }

    fn clear(&mut self, token: &CancellationToken) -> crate::Result<()> {
        token.checkpoint()?;

        for segment in &mut self.segments {
            segment.store.clear(token)?;
        }

        self.segments.clear();
        self.push_segment()?;

        log::debug!("cleared segmented log in {}", self.dir.display());

        Ok(())
    }

    fn compact(&mut self, token: &CancellationToken) -> crate::Result<()> {
        token.checkpoint()?;

        let items = self.get_all_items(token)?;
        let item_count = items.len();

        let survivors = dedupe_keep_last(items);
        let survivor_count = survivors.len();

        self.clear(token)?;

        if !survivors.is_empty() {
            self.set_bulk(survivors, token)?;
        }

        self.merge(token)?;

        log::debug!(
            "compacted {item_count} entries down to {survivor_count} across {} segment(s)",
            self.segments.len(),
        );

        Ok(())
    }
}

/// Extracts the timestamp from `<prefix>_segment_<17 digits>.log`.
fn parse_segment_timestamp(file_name: &str, prefix: &str) -> Option<u64> {
    let digits = file_name
        .strip_prefix(prefix)?
        .strip_prefix("_segment_")?
        .strip_suffix(".log")?;

    if digits.len() == TIMESTAMP_DIGITS && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fs::LockRegistry, store::append::AppendLog};
    use test_log::test;

    fn open_log(
        dir: &Path,
        max_segment_size: u64,
    ) -> crate::Result<
        SegmentedLog<
            i32,
            String,
            AppendLog<i32, String>,
            impl Fn(&Path) -> crate::Result<AppendLog<i32, String>>,
        >,
    > {
        let registry = LockRegistry::new();
        SegmentedLog::open(dir, "kv", max_segment_size, move |path: &Path| {
            AppendLog::open(path, &registry)
        })
    }

    #[test]
    fn segmented_parse_file_names() {
        assert_eq!(
            Some(20240506070809123),
            parse_segment_timestamp("kv_segment_20240506070809123.log", "kv")
        );

        assert_eq!(
            None,
            parse_segment_timestamp("kv_segment_2024050607080912.log", "kv"),
            "too few digits"
        );
        assert_eq!(
            None,
            parse_segment_timestamp("other_segment_20240506070809123.log", "kv")
        );
        assert_eq!(
            None,
            parse_segment_timestamp("kv_segment_20240506070809123.tmp", "kv")
        );
        assert_eq!(None, parse_segment_timestamp("kv.log", "kv"));
    }

    #[test]
    fn segmented_rejects_bad_config() {
        let dir = tempfile::tempdir().expect("tempdir");

        assert!(matches!(
            open_log(dir.path(), 0),
            Err(crate::Error::InvalidArgument(_))
        ));

        let registry = LockRegistry::new();
        assert!(matches!(
            SegmentedLog::<i32, String, _, _>::open(dir.path(), "", 64, move |path: &Path| {
                AppendLog::open(path, &registry)
            }),
            Err(crate::Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn segmented_names_stay_monotonic() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let token = CancellationToken::default();

        let mut log = open_log(dir.path(), 16)?;

        // Every write overflows the tiny cap, forcing a roll per write;
        // several rolls land in the same millisecond
        for i in 0..5 {
            log.set(i, "x".repeat(20), &token)?;
        }

        let paths = log.segment_paths();
        assert_eq!(5, paths.len());

        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);

        let unique: std::collections::BTreeSet<_> = paths.iter().collect();
        assert_eq!(5, unique.len());

        Ok(())
    }

    #[test]
    fn segmented_oversized_bulk_entry() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let token = CancellationToken::default();

        let mut log = open_log(dir.path(), 32)?;

        let result = log.set_bulk(vec![(1, "x".repeat(64))], &token);
        assert!(matches!(result, Err(crate::Error::CapacityExceeded)));

        Ok(())
    }
}
