// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An embedded, single-node key-value storage engine built around an
//! append-only log.
//!
//! ##### About
//!
//! Writes append serialized entries to a log file and never mutate in
//! place; reads resolve duplicates in favor of the latest write. On top of
//! the base log this crate layers:
//!
//! - an in-memory index ([`IndexedLog`]) that maps each key to its latest
//!   entry's byte range, turning point lookups into a single ranged read,
//! - a bloom filter wrapper ([`FilteredStore`]) that answers most negative
//!   lookups without touching the disk at all,
//! - a segment manager ([`SegmentedLog`]) that rolls the log into
//!   size-bounded immutable segments and reclaims space by compacting and
//!   merging them,
//! - in-memory reference stores ([`MemoryStore`], [`BoundedStore`]) sharing
//!   the same [`KeyValueStore`] contract.
//!
//! Every operation takes a [`CancellationToken`] and checks it
//! cooperatively before file accesses and between bulk items.
//!
//! # Example usage
//!
//! ```
//! use logcask::{AppendLog, CancellationToken, KeyValueStore, LockRegistry};
//! #
//! # let folder = tempfile::tempdir()?;
//! let registry = LockRegistry::new();
//! let token = CancellationToken::default();
//!
//! // One log file, opened (or created) in place
//! let mut store = AppendLog::open(folder.path().join("kv.log"), &registry)?;
//!
//! store.set(42i32, "SF".to_string(), &token)?;
//! store.set(42i32, "SF2".to_string(), &token)?;
//!
//! // Later writes win
//! assert_eq!(Some("SF2".to_string()), store.try_get(&42, &token)?);
//! assert_eq!(None, store.try_get(&99, &token)?);
//!
//! // Drop overwritten entries, atomically rewriting the log
//! store.compact(&token)?;
//! assert_eq!(Some("SF2".to_string()), store.try_get(&42, &token)?);
//! #
//! # Ok::<(), logcask::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]

/// Probabilistic set membership over key byte projections.
pub mod bloom;

mod cancel;

/// Wire format traits and the built-in scalar/string encodings.
pub mod coding;

mod entry;
mod error;

/// Single-file storage with per-path mutual exclusion.
pub mod file;

/// Filesystem facade owning the per-path lock registry.
pub mod fs;

/// The non-cryptographic 32-bit hash functions used by the bloom filter.
pub mod hash;

mod index;
mod path;

/// Capacity-bounded ordered map with red-black balancing.
pub mod rbtree;

/// The key-value engines and their shared contract.
pub mod store;

mod time;

pub use {
    bloom::BloomFilter,
    cancel::CancellationToken,
    coding::{Decode, DecodeError, Encode, EncodeError},
    entry::{Entry, LogReader, RecordLocator},
    error::{Error, Result},
    file::{CreateMode, DeleteMode, StorageFile},
    fs::LockRegistry,
    index::MemIndex,
    rbtree::RedBlackTree,
    store::{
        append::AppendLog, bounded::BoundedStore, filtered::FilteredStore, indexed::IndexedLog,
        memory::MemoryStore, segmented::SegmentedLog, KeyValueStore, StoreKey, StoreValue,
    },
};
