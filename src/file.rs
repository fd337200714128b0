// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    entry::RecordLocator,
    fs::{LockRegistry, PathLock},
    path::absolute_path,
};
use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::MutexGuard,
};

/// Policy for creating a file that may already exist.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CreateMode {
    /// Truncate an existing file to zero length.
    Overwrite,

    /// Leave an existing file untouched.
    DoNothingIfExists,

    /// Fail with [`crate::Error::AlreadyExists`] if the file exists.
    ThrowIfExists,
}

/// Policy for deleting a file that may not exist.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeleteMode {
    /// Deleting a missing file is a no-op.
    DeleteIfExists,

    /// Fail with [`crate::Error::NotFound`] if the file is missing.
    ThrowIfNotExists,
}

/// One on-disk file, serialized per path.
///
/// Every operation holds the path's mutex (shared through a
/// [`LockRegistry`]) for exactly the duration of the call, so concurrent
/// engine instances on the same path see serialized effects. Files are
/// opened per operation; [`StorageFile::appender`] is the single-open bulk
/// write path.
pub struct StorageFile {
    path: PathBuf,
    lock: PathLock,
}

impl std::fmt::Debug for StorageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageFile({})", self.path.display())
    }
}

impl StorageFile {
    /// Binds a path to its registry lock.
    ///
    /// No filesystem access happens until the first operation.
    pub fn new<P: AsRef<Path>>(path: P, registry: &LockRegistry) -> Self {
        let path = absolute_path(path);
        let lock = registry.lock_for(&path);

        Self { path, lock }
    }

    /// The (absolutized) path of this file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        #[allow(clippy::expect_used)]
        self.lock.lock().expect("lock is poisoned")
    }

    fn ensure_parent(&self) -> crate::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Creates the file (and any missing parent directories).
    pub fn create(&self, mode: CreateMode) -> crate::Result<()> {
        let _guard = self.guard();
        self.ensure_parent()?;

        match mode {
            CreateMode::Overwrite => {
                File::create(&self.path)?;
            }
            CreateMode::DoNothingIfExists => {
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .open(&self.path)?;
            }
            CreateMode::ThrowIfExists => match File::create_new(&self.path) {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    return Err(crate::Error::AlreadyExists);
                }
                Err(e) => return Err(e.into()),
            },
        }

        Ok(())
    }

    /// Deletes the file.
    pub fn delete(&self, mode: DeleteMode) -> crate::Result<()> {
        let _guard = self.guard();

        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => match mode {
                DeleteMode::DeleteIfExists => Ok(()),
                DeleteMode::ThrowIfNotExists => Err(crate::Error::NotFound),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Returns `true` if the file exists.
    pub fn exists(&self) -> crate::Result<bool> {
        let _guard = self.guard();
        Ok(self.path.try_exists()?)
    }

    /// Length in bytes; a missing file has length 0.
    pub fn len(&self) -> crate::Result<u64> {
        let _guard = self.guard();
        self.len_unlocked()
    }

    fn len_unlocked(&self) -> crate::Result<u64> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Appends `bytes` at the end, creating the file on demand.
    ///
    /// The write is flushed to the OS before returning; the returned locator
    /// is append-stable.
    pub fn append(&self, bytes: &[u8]) -> crate::Result<RecordLocator> {
        let _guard = self.guard();
        self.ensure_parent()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let offset = file.metadata()?.len();

        file.write_all(bytes)?;
        file.flush()?;

        Ok(RecordLocator {
            offset,
            len: bytes.len() as u64,
        })
    }

    /// Opens the file once for a run of appends, holding the path lock
    /// until the returned [`Appender`] is dropped.
    pub fn appender(&self) -> crate::Result<Appender<'_>> {
        let guard = self.guard();
        self.ensure_parent()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let offset = file.metadata()?.len();

        Ok(Appender {
            file,
            offset,
            _guard: guard,
        })
    }

    /// Reads `len` bytes starting at `offset`.
    ///
    /// Fails with [`crate::Error::OutOfRange`] when the range starts at or
    /// runs past the end of the file.
    pub fn read_at(&self, offset: u64, len: u64) -> crate::Result<Vec<u8>> {
        let _guard = self.guard();

        let file_len = self.len_unlocked()?;

        if offset >= file_len || offset + len > file_len {
            return Err(crate::Error::OutOfRange);
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut buf = vec![0; len as usize];
        file.read_exact(&mut buf)?;

        Ok(buf)
    }

    /// Reads the whole file into memory; a missing file reads as empty.
    pub fn read_all(&self) -> crate::Result<Vec<u8>> {
        let _guard = self.guard();

        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e.into()),
        }
    }

    /// Shortens the file to `len` bytes.
    ///
    /// Used to drop a torn trailing entry before new appends land behind it.
    pub fn truncate(&self, len: u64) -> crate::Result<()> {
        let _guard = self.guard();

        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(len)?;

        Ok(())
    }

    /// Atomically replaces the file contents.
    ///
    /// Writes to a temporary file in the same directory, syncs it and renames
    /// it over the path, so a crash leaves either the old or the new bytes.
    pub fn replace_contents(&self, bytes: &[u8]) -> crate::Result<()> {
        let _guard = self.guard();
        self.ensure_parent()?;

        // NOTE: The parent exists after ensure_parent
        #[allow(clippy::expect_used)]
        let parent = self.path.parent().expect("file should have a parent");

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(bytes)?;
        temp_file.flush()?;
        temp_file.as_file_mut().sync_all()?;
        temp_file.persist(&self.path).map_err(|e| e.error)?;

        Ok(())
    }
}

/// A single-open run of appends to one [`StorageFile`].
///
/// Holds the path lock for its whole lifetime; each append is flushed
/// individually, so cancellation between appends leaves a clean prefix.
pub struct Appender<'a> {
    file: File,
    offset: u64,
    _guard: MutexGuard<'a, ()>,
}

impl Appender<'_> {
    /// Appends one encoded record, returning its locator.
    pub fn append(&mut self, bytes: &[u8]) -> crate::Result<RecordLocator> {
        self.file.write_all(bytes)?;
        self.file.flush()?;

        let locator = RecordLocator {
            offset: self.offset,
            len: bytes.len() as u64,
        };

        self.offset += bytes.len() as u64;

        Ok(locator)
    }

    /// File offset the next append will land at.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }
}
