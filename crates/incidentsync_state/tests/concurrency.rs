//! Concurrent access to the file-backed failure set.

use incidentsync_state::{CursorStore, FailureStore, FileCursorStore, FileFailureSet};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

#[test]
fn shared_instance_never_loses_adds() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FileFailureSet::open(&dir.path().join("failed")));

    // Pre-populate entries for the "retry" thread to remove.
    for id in 1000..1040 {
        store.add(id).unwrap();
    }

    let adder = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for id in 0..40 {
                store.add(id).unwrap();
            }
        })
    };
    let remover = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for id in 1000..1040 {
                assert!(store.remove(id).unwrap());
            }
        })
    };

    adder.join().unwrap();
    remover.join().unwrap();

    let expected: BTreeSet<u64> = (0..40).collect();
    assert_eq!(store.load_all().unwrap(), expected);
}

#[test]
fn separate_instances_serialise_through_file_lock() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("failed");

    let handles: Vec<_> = (0..2u64)
        .map(|worker| {
            let path = path.clone();
            thread::spawn(move || {
                // Each worker opens its own store, like two processes would.
                let store = FileFailureSet::open(&path);
                for n in 0..25 {
                    store.add(worker * 100 + n).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let ids = FileFailureSet::open(&path).load_all().unwrap();
    assert_eq!(ids.len(), 50);
    assert!(ids.contains(&0));
    assert!(ids.contains(&124));
}

#[test]
fn cursor_and_failures_can_share_a_directory() {
    let dir = tempdir().unwrap();
    let cursor = FileCursorStore::open(&dir.path().join("last_processed_id"));
    let failures = FileFailureSet::open(&dir.path().join("failed_ids"));

    cursor.save(12).unwrap();
    failures.add(12).unwrap();

    assert_eq!(cursor.load().unwrap(), Some(12));
    assert_eq!(failures.load_all().unwrap(), BTreeSet::from([12]));
}
