// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

fn sample_device(host: &str) -> DeviceRuntimeState {
    DeviceRuntimeState::new(host, "panel64", "Kitchen Panel")
}

#[tokio::test]
async fn insert_and_read_device_round_trips() {
    let store = Store::new(GlobalState::default(), None, Duration::from_millis(10));
    store.insert_device("10.0.0.5", sample_device("10.0.0.5")).await;

    let got = store.device("10.0.0.5").await.expect("device present");
    assert_eq!(got.device_type, "panel64");
    assert_eq!(got.brightness, 100);
}

#[tokio::test]
async fn update_device_is_atomic_read_modify_write() {
    let store = Store::new(GlobalState::default(), None, Duration::from_millis(10));
    store.insert_device("10.0.0.5", sample_device("10.0.0.5")).await;

    store
        .update_device("10.0.0.5", |d| {
            d.brightness = 42;
            d.active_scene = Some("clock".to_owned());
        })
        .await;

    let got = store.device("10.0.0.5").await.expect("device present");
    assert_eq!(got.brightness, 42);
    assert_eq!(got.active_scene.as_deref(), Some("clock"));
}

#[tokio::test]
async fn update_unknown_device_is_a_noop() {
    let store = Store::new(GlobalState::default(), None, Duration::from_millis(10));
    // Must not panic even though no device is registered.
    store.update_device("ghost", |d| d.brightness = 1).await;
    assert!(store.device("ghost").await.is_none());
}

#[tokio::test]
async fn subscribers_observe_mutations_after_lock_release() {
    let store = Store::new(GlobalState::default(), None, Duration::from_millis(10));
    let mut rx = store.subscribe();

    store.insert_device("10.0.0.5", sample_device("10.0.0.5")).await;
    let event = rx.recv().await.expect("event delivered");
    assert_eq!(event.path, Path::device("10.0.0.5"));
}

#[tokio::test]
async fn scene_state_bag_carries_arbitrary_fields() {
    let store = Store::new(GlobalState::default(), None, Duration::from_millis(10));
    store
        .update_scene_state("10.0.0.5", "clock", |s| {
            s.frame_count += 1;
            s.bag.insert("lastTick".into(), serde_json::json!(12345));
        })
        .await;

    let state = store.scene_state("10.0.0.5", "clock").await.expect("present");
    assert_eq!(state.frame_count, 1);
    assert_eq!(state.bag.get("lastTick"), Some(&serde_json::json!(12345)));
}

#[tokio::test]
async fn snapshot_and_restore_round_trip_persisted_subset() {
    let store = Store::new(GlobalState::default(), None, Duration::from_millis(10));
    store.insert_device("10.0.0.5", sample_device("10.0.0.5")).await;
    store
        .update_device("10.0.0.5", |d| {
            d.brightness = 7;
            d.display_on = false;
            d.generation_id = 99;
        })
        .await;

    let snapshot = store.snapshot().await;

    let fresh = Store::new(GlobalState::default(), None, Duration::from_millis(10));
    fresh.insert_device("10.0.0.5", sample_device("10.0.0.5")).await;
    fresh.restore(snapshot).await;

    let restored = fresh.device("10.0.0.5").await.expect("present");
    assert_eq!(restored.brightness, 7);
    assert!(!restored.display_on);
    // generationId is transient and must not survive a restore.
    assert_eq!(restored.generation_id, 0);
}

#[tokio::test]
async fn persisted_snapshot_writes_and_reads_back_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Store::new(GlobalState::default(), Some(dir.path().to_path_buf()), Duration::from_millis(10));
    store.insert_device("10.0.0.5", sample_device("10.0.0.5")).await;
    store.flush_persistence().await;

    let loaded = Store::load_persisted(Some(dir.path())).expect("snapshot on disk");
    assert!(loaded.devices.contains_key("10.0.0.5"));
}
