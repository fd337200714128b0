// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use logcask::{AppendLog, CancellationToken, KeyValueStore, LockRegistry};
use test_log::test;

#[test]
fn append_basic_overwrite() -> logcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let registry = LockRegistry::new();
    let token = CancellationToken::default();

    let mut store = AppendLog::open(folder.path().join("kv.log"), &registry)?;

    store.set(42i32, "SF".to_string(), &token)?;
    assert_eq!(Some("SF".to_string()), store.try_get(&42, &token)?);

    store.set(42i32, "SF2".to_string(), &token)?;
    assert_eq!(Some("SF2".to_string()), store.try_get(&42, &token)?);

    assert_eq!(None, store.try_get(&99, &token)?);
    assert!(store.contains_key(&42, &token)?);
    assert!(!store.contains_key(&99, &token)?);

    Ok(())
}

#[test]
fn append_keeps_duplicates_in_write_order() -> logcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let registry = LockRegistry::new();
    let token = CancellationToken::default();

    let mut store = AppendLog::open(folder.path().join("kv.log"), &registry)?;

    store.set(1i32, "a".to_string(), &token)?;
    store.set(2i32, "b".to_string(), &token)?;
    store.set(1i32, "c".to_string(), &token)?;

    let items = store.get_all_items(&token)?;

    assert_eq!(
        vec![
            (1, "a".to_string()),
            (2, "b".to_string()),
            (1, "c".to_string()),
        ],
        items
    );

    Ok(())
}

#[test]
fn append_remove_unsupported() -> logcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let registry = LockRegistry::new();
    let token = CancellationToken::default();

    let mut store = AppendLog::<i32, String>::open(folder.path().join("kv.log"), &registry)?;
    store.set(1, "a".to_string(), &token)?;

    assert!(matches!(
        store.remove(&1, &token),
        Err(logcask::Error::NotSupported(_))
    ));

    // Still readable afterwards
    assert_eq!(Some("a".to_string()), store.try_get(&1, &token)?);

    Ok(())
}

#[test]
fn append_clear_deletes_log() -> logcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let registry = LockRegistry::new();
    let token = CancellationToken::default();
    let path = folder.path().join("kv.log");

    let mut store = AppendLog::open(&path, &registry)?;

    store.set(1i32, "a".to_string(), &token)?;
    store.clear(&token)?;

    assert!(!path.try_exists()?);
    assert_eq!(None, store.try_get(&1, &token)?);

    // Writable again after clearing
    store.set(2i32, "b".to_string(), &token)?;
    assert_eq!(Some("b".to_string()), store.try_get(&2, &token)?);

    Ok(())
}

#[test]
fn append_bulk_then_read() -> logcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let registry = LockRegistry::new();
    let token = CancellationToken::default();

    let mut store = AppendLog::open(folder.path().join("kv.log"), &registry)?;

    store.set_bulk((0..1_000i32).map(|i| (i, format!("v{i}"))), &token)?;

    assert_eq!(1_000, store.get_all_items(&token)?.len());
    assert_eq!(Some("v512".to_string()), store.try_get(&512, &token)?);

    Ok(())
}
