// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::path::absolute_path;
use rustc_hash::FxHashMap;
use std::{
    path::Path,
    sync::{Arc, Mutex},
};

/// Handle to one path's mutex inside a [`LockRegistry`].
pub type PathLock = Arc<Mutex<()>>;

/// Registry of per-path mutexes.
///
/// Storage files on the same path share one mutex, so concurrent engine
/// instances inside one process cannot interleave their file operations.
/// The registry is owned explicitly (no process-wide static) so test suites
/// can sandbox themselves by constructing their own.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<FxHashMap<std::path::PathBuf, PathLock>>,
}

impl LockRegistry {
    /// Creates an empty registry behind an [`Arc`], ready to be shared
    /// between engine instances.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns the mutex guarding `path`, creating it on first use.
    ///
    /// Paths are absolutized, so relative and absolute spellings of the same
    /// file share one lock.
    pub fn lock_for<P: AsRef<Path>>(&self, path: P) -> PathLock {
        let key = absolute_path(path);

        #[allow(clippy::expect_used)]
        let mut locks = self.locks.lock().expect("lock is poisoned");

        locks.entry(key).or_default().clone()
    }

    /// Number of paths currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        #[allow(clippy::expect_used)]
        self.locks.lock().expect("lock is poisoned").len()
    }

    /// Returns `true` if no path was locked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
