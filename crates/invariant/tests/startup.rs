//! Startup scans over snapshots reloaded from disk or retained in history.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]

use std::sync::Arc;

use tiermark_invariant::{InvariantError, InvariantManager};
use tiermark_state::{ImageStore, SnapshotImage, SnapshotManager, SnapshotPair};
use tiermark_test_utils::{
    SimulatedLedger, TestDir,
    fixtures::{archive_snapshot, header, live_snapshot, persistent_data},
    test_invariant_config, test_snapshot_config,
};

fn manager() -> InvariantManager {
    let mut manager = InvariantManager::new(&test_invariant_config(&["ArchivedStateConsistency"]));
    manager.register_builtin().unwrap();
    manager.enable_from_config().unwrap();
    manager
}

/// Runs a short history that archives seeds 0..4 and keeps 4..8 live.
fn populated_ledger() -> SimulatedLedger {
    let mut ledger = SimulatedLedger::new(24);
    for seed in 0..8 {
        let lifetime = if seed < 4 { 2 } else { 100 };
        ledger.create(persistent_data(seed, seed, 0), lifetime);
    }
    for _ in 0..4 {
        ledger.close().unwrap();
    }
    ledger
}

#[test]
fn test_start_accepts_image_reloaded_from_disk() {
    let dir = TestDir::new();
    let store = ImageStore::new(dir.join("images"), 2);
    let ledger = populated_ledger();
    assert_eq!(ledger.archive().len(), 4);

    let image = SnapshotImage::capture(ledger.live(), ledger.archive()).unwrap();
    store.save(&image).unwrap();

    let (live, archive) = store.load_latest().unwrap().unwrap().into_snapshots();
    assert_eq!(live.len(), ledger.live().len());
    assert_eq!(archive.len(), 4);

    let mut manager = manager();
    manager.start(&live, &archive).unwrap();
    assert_eq!(manager.failure_count(), 0);
}

#[test]
fn test_start_rejects_image_with_key_in_both_tiers() {
    let dir = TestDir::new();
    let store = ImageStore::new(dir.join("images"), 2);
    let entry = persistent_data(1, 1, 1);
    let live = live_snapshot(header(9, 24), vec![entry.clone()]);
    let archive = archive_snapshot(header(9, 24), vec![entry.clone()]);
    store.save(&SnapshotImage::capture(&live, &archive).unwrap()).unwrap();

    let (live, archive) = store.load(9).unwrap().into_snapshots();
    let mut manager = manager();
    match manager.start(&live, &archive) {
        Err(InvariantError::DoesNotHold { message }) => {
            assert!(message.contains("present in both live and archived state"), "{message}");
            assert!(message.contains(&entry.key().to_string()), "{message}");
        },
        other => panic!("expected DoesNotHold, got {other:?}"),
    }
    assert_eq!(manager.failure_info("ArchivedStateConsistency").unwrap().last_failed_on_ledger, 9);
}

#[test]
fn test_start_on_retained_history_pair() {
    let snapshots = SnapshotManager::new(&test_snapshot_config(3));
    let mut ledger = populated_ledger();
    for _ in 0..3 {
        let closed = ledger.close().unwrap();
        let pair = SnapshotPair::new(Arc::new(closed.live), Arc::new(closed.archive)).unwrap();
        snapshots.publish(pair).unwrap();
    }
    assert_eq!(snapshots.retained_ledgers(), vec![6, 7, 8]);

    let mut manager = manager();
    for seq in snapshots.retained_ledgers() {
        let pair = snapshots.at(seq).unwrap();
        manager.start(pair.live.as_ref(), pair.archive.as_ref()).unwrap();
    }
    assert_eq!(manager.failure_count(), 0);
}
