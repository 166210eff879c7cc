// crates/honeygrid-sync/tests/synchronizer_flow.rs
// ============================================================================
// Module: Routing Synchronizer Integration Tests
// Description: Table/file alignment, rollback, and resync behavior.
// Purpose: Exercise the synchronizer against a real filesystem target.
// Dependencies: honeygrid_core, honeygrid_sync, tempfile
// ============================================================================

//! ## Overview
//! Integration coverage for the routing synchronizer: publish and remove
//! keep the installed file aligned with the routing table, install failures
//! roll the table back, and resync reproduces the file from table state
//! alone.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use honeygrid_core::InMemoryPoolStore;
use honeygrid_core::PoolStore;
use honeygrid_core::RoutingKeyGenerator;
use honeygrid_core::SessionId;
use honeygrid_core::Timestamp;
use honeygrid_core::UpstreamAddr;
use honeygrid_sync::RoutingSynchronizer;
use honeygrid_sync::SyncError;

fn at(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

fn synchronizer(store: &Arc<InMemoryPoolStore>, path: PathBuf) -> RoutingSynchronizer {
    let store: Arc<dyn PoolStore> = Arc::clone(store) as Arc<dyn PoolStore>;
    RoutingSynchronizer::new(store, path, "tier1_pool")
}

#[test]
fn publish_and_remove_keep_file_and_table_aligned() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("honeygrid_upstream.map");
    let store = Arc::new(InMemoryPoolStore::new());
    let sync = synchronizer(&store, target.clone());
    let session = SessionId::new("sess-a");
    let key = RoutingKeyGenerator::new().derive(&session);

    let entry = sync
        .publish_assignment(&session, key.clone(), UpstreamAddr::new("10.0.2.7", 8_091), at(1_000))
        .unwrap();
    assert_eq!(store.routing_entry(&session).unwrap(), Some(entry));
    let content = std::fs::read_to_string(&target).unwrap();
    assert!(content.contains(key.as_str()));
    assert!(content.contains("10.0.2.7:8091"));

    sync.remove_assignment(&session, at(2_000)).unwrap();
    assert_eq!(store.routing_entry(&session).unwrap(), None);
    let content = std::fs::read_to_string(&target).unwrap();
    assert!(!content.contains(key.as_str()));
    assert!(content.contains("default \"tier1_pool\";"));
}

#[test]
fn republish_preserves_creation_time_and_replaces_upstream() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("honeygrid_upstream.map");
    let store = Arc::new(InMemoryPoolStore::new());
    let sync = synchronizer(&store, target.clone());
    let session = SessionId::new("sess-a");
    let generator = RoutingKeyGenerator::new();
    let key = generator.derive(&session);

    sync.publish_assignment(&session, key.clone(), UpstreamAddr::new("10.0.2.2", 8_081), at(1_000))
        .unwrap();
    let replaced = sync
        .publish_assignment(&session, key.clone(), UpstreamAddr::new("10.0.2.7", 8_091), at(2_000))
        .unwrap();

    assert_eq!(replaced.created_at, at(1_000));
    assert_eq!(replaced.updated_at, at(2_000));
    let content = std::fs::read_to_string(&target).unwrap();
    assert!(content.contains("10.0.2.7:8091"));
    assert!(!content.contains("10.0.2.2:8081"));
    // Still exactly one row for the session.
    assert_eq!(store.routing_entries().unwrap().len(), 1);
}

#[test]
fn install_failure_rolls_the_table_back() {
    let dir = TempDir::new().unwrap();
    // Parent directory does not exist, so the install step must fail.
    let target = dir.path().join("absent").join("honeygrid_upstream.map");
    let store = Arc::new(InMemoryPoolStore::new());
    let sync = synchronizer(&store, target);
    let session = SessionId::new("sess-a");
    let key = RoutingKeyGenerator::new().derive(&session);

    let err = sync
        .publish_assignment(&session, key, UpstreamAddr::new("10.0.2.2", 8_081), at(1_000))
        .unwrap_err();
    assert!(matches!(err, SyncError::Io(_)));
    assert_eq!(store.routing_entry(&session).unwrap(), None);
}

#[test]
fn install_failure_restores_the_previous_entry() {
    let dir = TempDir::new().unwrap();
    let live_target = dir.path().join("honeygrid_upstream.map");
    let store = Arc::new(InMemoryPoolStore::new());
    let session = SessionId::new("sess-a");
    let generator = RoutingKeyGenerator::new();
    let key = generator.derive(&session);

    let sync = synchronizer(&store, live_target);
    let original = sync
        .publish_assignment(&session, key, UpstreamAddr::new("10.0.2.2", 8_081), at(1_000))
        .unwrap();

    // A second synchronizer over the same table but an uninstallable path.
    let broken = synchronizer(&store, dir.path().join("absent").join("map"));
    let err = broken
        .publish_assignment(
            &session,
            generator.derive(&session),
            UpstreamAddr::new("10.0.2.7", 8_091),
            at(2_000),
        )
        .unwrap_err();
    assert!(matches!(err, SyncError::Io(_)));
    assert_eq!(store.routing_entry(&session).unwrap(), Some(original));
}

#[test]
fn concurrent_publishes_leave_the_file_matching_the_table() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("honeygrid_upstream.map");
    let store = Arc::new(InMemoryPoolStore::new());
    let sync = Arc::new(synchronizer(&store, target.clone()));
    let generator = Arc::new(RoutingKeyGenerator::new());

    std::thread::scope(|scope| {
        for index in 0..8 {
            let sync = Arc::clone(&sync);
            let generator = Arc::clone(&generator);
            scope.spawn(move || {
                let session = SessionId::new(format!("sess-{index}"));
                sync.publish_assignment(
                    &session,
                    generator.derive(&session),
                    UpstreamAddr::new("10.0.2.2", 8_081 + index),
                    at(1_000),
                )
                .unwrap();
            });
        }
    });

    // Each publish held the sequence lock across table write and install,
    // so the last install rendered the complete table.
    let entries = store.routing_entries().unwrap();
    assert_eq!(entries.len(), 8);
    let content = std::fs::read_to_string(&target).unwrap();
    for entry in entries {
        assert!(content.contains(entry.routing_key.as_str()));
    }
}

#[test]
fn resync_reproduces_the_file_from_table_state() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("honeygrid_upstream.map");
    let store = Arc::new(InMemoryPoolStore::new());
    let sync = synchronizer(&store, target.clone());
    let generator = RoutingKeyGenerator::new();
    for index in 0..3 {
        let session = SessionId::new(format!("sess-{index}"));
        sync.publish_assignment(
            &session,
            generator.derive(&session),
            UpstreamAddr::new("10.0.2.2", 8_081 + index),
            at(1_000),
        )
        .unwrap();
    }

    std::fs::remove_file(&target).unwrap();
    sync.resync(at(2_000)).unwrap();
    let content = std::fs::read_to_string(&target).unwrap();
    for index in 0..3 {
        assert!(content.contains(&format!("# Session: sess-{index}")));
    }
}
