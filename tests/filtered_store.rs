// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use logcask::{
    AppendLog, CancellationToken, FilteredStore, IndexedLog, KeyValueStore, LockRegistry,
};
use test_log::test;

#[test]
fn filtered_negative_lookup_short_circuits() -> logcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let registry = LockRegistry::new();
    let token = CancellationToken::default();

    let inner = AppendLog::open(folder.path().join("kv.log"), &registry)?;
    let mut store = FilteredStore::new(inner, 1_000, 0.01)?;

    for key in [10i32, 20, 30] {
        store.set(key, format!("v{key}"), &token)?;
    }

    assert!(store.contains_key(&10, &token)?);
    assert!(store.contains_key(&30, &token)?);
    assert_eq!(Some("v20".to_string()), store.try_get(&20, &token)?);

    // Far-away key: the filter rules it out before the log is read
    assert!(!store.contains_key(&99_999, &token)?);
    assert_eq!(None, store.try_get(&99_999, &token)?);
    assert!(!store.filter().contains(b"99999"));

    Ok(())
}

#[test]
fn filtered_filter_is_repopulated_on_reopen() -> logcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let registry = LockRegistry::new();
    let token = CancellationToken::default();
    let path = folder.path().join("kv.log");

    {
        let inner = AppendLog::open(&path, &registry)?;
        let mut store = FilteredStore::new(inner, 100, 0.01)?;
        store.set(7i32, "seven".to_string(), &token)?;
    }

    // The filter state died with the process; rebuilding the wrapper seeds
    // it from the persistent log
    let inner = AppendLog::open(&path, &registry)?;
    let store = FilteredStore::new(inner, 100, 0.01)?;

    assert!(store.filter().contains(b"7"));
    assert_eq!(Some("seven".to_string()), store.try_get(&7, &token)?);
    assert!(!store.contains_key(&8, &token)?);

    Ok(())
}

#[test]
fn filtered_bulk_adds_all_keys() -> logcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let registry = LockRegistry::new();
    let token = CancellationToken::default();

    let inner = IndexedLog::open(folder.path().join("kv.log"), &registry)?;
    let mut store = FilteredStore::new(inner, 1_000, 0.01)?;

    store.set_bulk((0..200i32).map(|i| (i, format!("v{i}"))), &token)?;

    for key in (0..200i32).step_by(17) {
        assert!(store.contains_key(&key, &token)?);
        assert_eq!(Some(format!("v{key}")), store.try_get(&key, &token)?);
    }

    Ok(())
}

#[test]
fn filtered_clear_clears_filter_and_inner() -> logcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let registry = LockRegistry::new();
    let token = CancellationToken::default();

    let inner = AppendLog::open(folder.path().join("kv.log"), &registry)?;
    let mut store = FilteredStore::new(inner, 100, 0.01)?;

    store.set(1i32, "x".to_string(), &token)?;
    store.clear(&token)?;

    assert!(!store.filter().contains(b"1"));
    assert!(!store.contains_key(&1, &token)?);
    assert!(store.get_all_items(&token)?.is_empty());

    Ok(())
}

#[test]
fn filtered_compact_keeps_lookups_sound() -> logcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let registry = LockRegistry::new();
    let token = CancellationToken::default();

    let inner = AppendLog::open(folder.path().join("kv.log"), &registry)?;
    let mut store = FilteredStore::new(inner, 1_000, 0.01)?;

    for i in 0..100i32 {
        store.set(i % 10, format!("v{i}"), &token)?;
    }

    store.compact(&token)?;

    for k in 0..10i32 {
        assert!(store.contains_key(&k, &token)?);
        assert_eq!(Some(format!("v{}", 90 + k)), store.try_get(&k, &token)?);
    }

    Ok(())
}
