//! Tests for the storage façade
//!
//! These tests verify:
//! - Put/get/delete through column families
//! - Batch atomicity and last-write-wins within a batch
//! - Snapshot isolation of readers
//! - Column family iteration order, seek and isolation
//! - Reader close leaving committed state untouched
//! - Lifecycle transitions and violations
//! - Persistence across stop/start

use std::sync::Arc;
use std::thread;

use cfkv::config::WalSyncStrategy;
use cfkv::{
    ColumnFamily, Config, Context, KvError, Modify, StandaloneStorage, Storage, StorageReader,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn config(dir: &TempDir) -> Config {
    Config::builder()
        .data_dir(dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .build()
}

fn started(dir: &TempDir) -> StandaloneStorage {
    let storage = StandaloneStorage::new(config(dir));
    storage.start().unwrap();
    storage
}

fn get(storage: &StandaloneStorage, cf: ColumnFamily, key: &[u8]) -> Option<Vec<u8>> {
    let reader = storage.reader(&Context::default()).unwrap();
    let value = reader.get_cf(cf, key).unwrap();
    reader.close();
    value
}

fn write(storage: &StandaloneStorage, batch: Vec<Modify>) {
    storage.write(&Context::default(), batch).unwrap();
}

fn scan_all<R: StorageReader>(reader: &R, cf: ColumnFamily) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut iter = reader.iter_cf(cf);
    let mut pairs = Vec::new();
    while iter.valid() {
        let item = iter.item().unwrap();
        pairs.push((item.key().to_vec(), item.value().unwrap()));
        iter.next();
    }
    iter.close();
    pairs
}

// =============================================================================
// Point Operations
// =============================================================================

#[test]
fn test_put_then_get_in_every_family() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);

    for cf in ColumnFamily::ALL {
        write(&storage, vec![Modify::put(cf, "k", format!("v-{}", cf))]);
    }

    for cf in ColumnFamily::ALL {
        assert_eq!(
            get(&storage, cf, b"k"),
            Some(format!("v-{}", cf).into_bytes())
        );
    }
}

#[test]
fn test_missing_key_is_absent_not_error() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);

    assert_eq!(get(&storage, ColumnFamily::Default, b"nope"), None);
}

#[test]
fn test_delete_makes_key_absent() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);

    write(&storage, vec![Modify::put(ColumnFamily::Default, "k", "v")]);
    write(&storage, vec![Modify::delete(ColumnFamily::Default, "k")]);
    assert_eq!(get(&storage, ColumnFamily::Default, b"k"), None);

    // deleting a key that never existed succeeds
    write(&storage, vec![Modify::delete(ColumnFamily::Lock, "ghost")]);
    assert_eq!(get(&storage, ColumnFamily::Lock, b"ghost"), None);
}

#[test]
fn test_empty_value_differs_from_absent() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);

    write(&storage, vec![Modify::put(ColumnFamily::Default, "empty", "")]);

    assert_eq!(get(&storage, ColumnFamily::Default, b"empty"), Some(Vec::new()));
    assert_eq!(get(&storage, ColumnFamily::Default, b"other"), None);
}

#[test]
fn test_namespace_isolation() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);

    write(
        &storage,
        vec![
            Modify::put(ColumnFamily::Default, "k", "v1"),
            Modify::put(ColumnFamily::Write, "k", "v2"),
        ],
    );

    assert_eq!(get(&storage, ColumnFamily::Default, b"k"), Some(b"v1".to_vec()));
    assert_eq!(get(&storage, ColumnFamily::Write, b"k"), Some(b"v2".to_vec()));
    assert_eq!(get(&storage, ColumnFamily::Lock, b"k"), None);

    write(&storage, vec![Modify::delete(ColumnFamily::Default, "k")]);
    assert_eq!(get(&storage, ColumnFamily::Write, b"k"), Some(b"v2".to_vec()));
}

// =============================================================================
// Batches
// =============================================================================

#[test]
fn test_put_then_delete_in_one_batch() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);

    write(
        &storage,
        vec![
            Modify::put(ColumnFamily::Default, "k", "v"),
            Modify::delete(ColumnFamily::Default, "k"),
        ],
    );

    assert_eq!(get(&storage, ColumnFamily::Default, b"k"), None);
}

#[test]
fn test_later_put_wins_in_one_batch() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);

    write(
        &storage,
        vec![
            Modify::delete(ColumnFamily::Default, "k"),
            Modify::put(ColumnFamily::Default, "k", "first"),
            Modify::put(ColumnFamily::Default, "k", "second"),
        ],
    );

    assert_eq!(get(&storage, ColumnFamily::Default, b"k"), Some(b"second".to_vec()));
}

#[test]
fn test_empty_batch_is_accepted() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);

    write(&storage, Vec::new());
}

#[test]
fn test_concurrent_batches_are_atomic() {
    let temp = TempDir::new().unwrap();
    let storage = Arc::new(started(&temp));

    // every batch writes the same value to both keys
    let writers: Vec<_> = (0..4)
        .map(|t| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                for i in 0..50 {
                    let value = format!("{}-{}", t, i);
                    storage
                        .write(
                            &Context::default(),
                            vec![
                                Modify::put(ColumnFamily::Default, "x", value.clone()),
                                Modify::put(ColumnFamily::Lock, "y", value),
                            ],
                        )
                        .unwrap();
                }
            })
        })
        .collect();

    let checker = {
        let storage = Arc::clone(&storage);
        thread::spawn(move || {
            for _ in 0..200 {
                let reader = storage.reader(&Context::default()).unwrap();
                let x = reader.get_cf(ColumnFamily::Default, b"x").unwrap();
                let y = reader.get_cf(ColumnFamily::Lock, b"y").unwrap();
                assert_eq!(x, y);
                reader.close();
            }
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    checker.join().unwrap();
}

// =============================================================================
// Snapshot Isolation
// =============================================================================

#[test]
fn test_reader_does_not_see_later_writes() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);
    write(&storage, vec![Modify::put(ColumnFamily::Default, "a", "1")]);

    let reader = storage.reader(&Context::default()).unwrap();

    write(
        &storage,
        vec![
            Modify::put(ColumnFamily::Default, "a", "2"),
            Modify::put(ColumnFamily::Default, "b", "2"),
        ],
    );

    assert_eq!(
        reader.get_cf(ColumnFamily::Default, b"a").unwrap(),
        Some(b"1".to_vec())
    );
    assert_eq!(reader.get_cf(ColumnFamily::Default, b"b").unwrap(), None);
    assert_eq!(
        scan_all(&reader, ColumnFamily::Default),
        vec![(b"a".to_vec(), b"1".to_vec())]
    );
    reader.close();

    // a fresh reader sees the write
    assert_eq!(get(&storage, ColumnFamily::Default, b"a"), Some(b"2".to_vec()));
}

#[test]
fn test_reader_snapshot_survives_flush() {
    let temp = TempDir::new().unwrap();
    let storage = StandaloneStorage::new(
        Config::builder()
            .data_dir(temp.path())
            .wal_sync_strategy(WalSyncStrategy::EveryWrite)
            .memtable_size_limit(512)
            .build(),
    );
    storage.start().unwrap();
    write(&storage, vec![Modify::put(ColumnFamily::Default, "a", "1")]);

    let reader = storage.reader(&Context::default()).unwrap();

    // enough data to force several flushes
    for i in 0..40 {
        write(
            &storage,
            vec![Modify::put(ColumnFamily::Default, format!("k{:02}", i), vec![b'x'; 64])],
        );
    }
    write(&storage, vec![Modify::delete(ColumnFamily::Default, "a")]);

    assert_eq!(
        reader.get_cf(ColumnFamily::Default, b"a").unwrap(),
        Some(b"1".to_vec())
    );
    assert_eq!(scan_all(&reader, ColumnFamily::Default).len(), 1);
    reader.close();

    assert_eq!(get(&storage, ColumnFamily::Default, b"a"), None);
}

// =============================================================================
// Iteration
// =============================================================================

#[test]
fn test_iteration_is_ascending() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);

    for key in ["a", "c", "b"] {
        write(&storage, vec![Modify::put(ColumnFamily::Default, key, key)]);
    }

    let reader = storage.reader(&Context::default()).unwrap();
    let keys: Vec<_> = scan_all(&reader, ColumnFamily::Default)
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

    let mut iter = reader.iter_cf(ColumnFamily::Default);
    iter.seek(b"b");
    assert!(iter.valid());
    assert_eq!(iter.item().unwrap().key(), b"b");
    assert_eq!(iter.item().unwrap().value().unwrap(), b"b".to_vec());

    // re-seek backwards within the same reader
    iter.seek(b"a");
    assert_eq!(iter.item().unwrap().key(), b"a");

    iter.seek(b"d");
    assert!(!iter.valid());
    assert!(iter.item().is_none());

    iter.rewind();
    assert_eq!(iter.item().unwrap().key(), b"a");
    iter.close();
    reader.close();
}

#[test]
fn test_iteration_stays_inside_family() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);

    write(
        &storage,
        vec![
            Modify::put(ColumnFamily::Default, "z", "d"),
            Modify::put(ColumnFamily::Lock, "a", "l1"),
            Modify::put(ColumnFamily::Lock, "b", "l2"),
            Modify::put(ColumnFamily::Write, "a", "w"),
        ],
    );

    let reader = storage.reader(&Context::default()).unwrap();
    assert_eq!(
        scan_all(&reader, ColumnFamily::Lock),
        vec![
            (b"a".to_vec(), b"l1".to_vec()),
            (b"b".to_vec(), b"l2".to_vec()),
        ]
    );
    assert_eq!(scan_all(&reader, ColumnFamily::Default).len(), 1);
    assert_eq!(scan_all(&reader, ColumnFamily::Write).len(), 1);

    let mut iter = reader.iter_cf(ColumnFamily::Default);
    iter.seek(b"zz");
    assert!(!iter.valid());
    iter.close();
    reader.close();
}

#[test]
fn test_iterating_empty_family() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);
    write(&storage, vec![Modify::put(ColumnFamily::Write, "k", "v")]);

    let reader = storage.reader(&Context::default()).unwrap();
    let iter = reader.iter_cf(ColumnFamily::Lock);
    assert!(!iter.valid());
    assert_eq!(iter.cf(), ColumnFamily::Lock);
    iter.close();
    reader.close();
}

#[test]
fn test_iterator_skips_deleted_keys() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);

    write(
        &storage,
        vec![
            Modify::put(ColumnFamily::Default, "a", "1"),
            Modify::put(ColumnFamily::Default, "b", "2"),
            Modify::put(ColumnFamily::Default, "c", "3"),
        ],
    );
    write(&storage, vec![Modify::delete(ColumnFamily::Default, "b")]);

    let reader = storage.reader(&Context::default()).unwrap();
    let keys: Vec<_> = scan_all(&reader, ColumnFamily::Default)
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"c".to_vec()]);
    reader.close();
}

// =============================================================================
// Resource Safety
// =============================================================================

#[test]
fn test_reader_close_has_no_side_effects() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);
    write(&storage, vec![Modify::put(ColumnFamily::Default, "a", "1")]);

    for _ in 0..10 {
        let reader = storage.reader(&Context::default()).unwrap();
        assert!(reader.get_cf(ColumnFamily::Default, b"a").unwrap().is_some());
        assert!(reader.get_cf(ColumnFamily::Default, b"zz").unwrap().is_none());
        let _ = scan_all(&reader, ColumnFamily::Default);
        reader.close();
    }

    assert_eq!(storage.open_readers(), 0);

    let reader = storage.reader(&Context::default()).unwrap();
    assert_eq!(
        scan_all(&reader, ColumnFamily::Default),
        vec![(b"a".to_vec(), b"1".to_vec())]
    );
    reader.close();
}

#[test]
fn test_read_only_reader_does_not_advance_sequence() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);
    write(&storage, vec![Modify::put(ColumnFamily::Default, "a", "1")]);

    let first = storage.reader(&Context::default()).unwrap();
    let seq = first.read_seq();
    first.close();

    let second = storage.reader(&Context::default()).unwrap();
    assert_eq!(second.read_seq(), seq);
    second.close();
}

#[test]
fn test_dropping_reader_releases_it() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);

    {
        let _reader = storage.reader(&Context::default()).unwrap();
        assert_eq!(storage.open_readers(), 1);
    }
    assert_eq!(storage.open_readers(), 0);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_operations_before_start_fail() {
    let temp = TempDir::new().unwrap();
    let storage = StandaloneStorage::new(config(&temp));
    assert!(!storage.is_running());

    assert!(matches!(
        storage.reader(&Context::default()),
        Err(KvError::Lifecycle(_))
    ));
    assert!(matches!(
        storage.write(&Context::default(), vec![Modify::put(ColumnFamily::Default, "k", "v")]),
        Err(KvError::Lifecycle(_))
    ));
    assert!(matches!(storage.stop(), Err(KvError::Lifecycle(_))));

    // the failed stop did not change state
    storage.start().unwrap();
    assert!(storage.is_running());
    storage.stop().unwrap();
}

#[test]
fn test_operations_after_stop_fail() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);
    storage.stop().unwrap();
    assert!(!storage.is_running());

    assert!(matches!(
        storage.reader(&Context::default()),
        Err(KvError::Lifecycle(_))
    ));
    assert!(matches!(
        storage.write(&Context::default(), Vec::new()),
        Err(KvError::Lifecycle(_))
    ));
    assert!(matches!(storage.stop(), Err(KvError::Lifecycle(_))));
    assert!(matches!(storage.start(), Err(KvError::Lifecycle(_))));
}

#[test]
fn test_double_start_fails() {
    let temp = TempDir::new().unwrap();
    let storage = started(&temp);

    assert!(matches!(storage.start(), Err(KvError::Lifecycle(_))));
    assert!(storage.is_running());
}

#[test]
fn test_start_failure_is_reported() {
    let temp = TempDir::new().unwrap();
    // a regular file where the data directory should be
    let blocker = temp.path().join("data");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let storage = StandaloneStorage::new(Config::builder().data_dir(&blocker).build());
    assert!(storage.start().is_err());
    assert!(!storage.is_running());
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn test_data_survives_stop_and_start() {
    let temp = TempDir::new().unwrap();
    {
        let storage = started(&temp);
        write(
            &storage,
            vec![
                Modify::put(ColumnFamily::Default, "a", "1"),
                Modify::put(ColumnFamily::Lock, "a", "lock"),
                Modify::put(ColumnFamily::Write, "w", "x"),
            ],
        );
        write(&storage, vec![Modify::delete(ColumnFamily::Write, "w")]);
        storage.stop().unwrap();
    }

    let storage = started(&temp);
    assert_eq!(get(&storage, ColumnFamily::Default, b"a"), Some(b"1".to_vec()));
    assert_eq!(get(&storage, ColumnFamily::Lock, b"a"), Some(b"lock".to_vec()));
    assert_eq!(get(&storage, ColumnFamily::Write, b"w"), None);
    storage.stop().unwrap();
}

#[test]
fn test_data_survives_crash_without_stop() {
    let temp = TempDir::new().unwrap();
    {
        let storage = started(&temp);
        write(&storage, vec![Modify::put(ColumnFamily::Default, "a", "1")]);
        // dropped while running
    }

    let storage = started(&temp);
    assert_eq!(get(&storage, ColumnFamily::Default, b"a"), Some(b"1".to_vec()));
}
