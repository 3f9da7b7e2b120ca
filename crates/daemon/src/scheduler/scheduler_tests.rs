// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::DeviceConfig;
use crate::observability::ObservabilityPublisher;
use crate::registry::{DeviceEntry, DeviceRegistry};
use crate::scene::SceneRegistry;
use crate::store::{DeviceRuntimeState, GlobalState, PlayState, Store};
use pixoo_driver::{DisplayCapabilities, MockDriver};
use std::sync::Arc;
use std::time::Duration;

fn device_config(host: &str) -> DeviceConfig {
    DeviceConfig {
        host: host.to_owned(),
        device_type: "panel64".to_owned(),
        driver: Some(pixoo_driver::DriverKind::Mock),
        display_name: None,
        startup_scene: Some("static_text".to_owned()),
        brightness: None,
        watchdog: None,
        scheduled_scenes: Vec::new(),
    }
}

async fn harness(host: &str) -> (SchedulerHandle, Arc<Store>, Arc<DeviceRegistry>) {
    let store = Store::new(GlobalState::default(), None, Duration::from_millis(10));
    store.insert_device(host, DeviceRuntimeState::new(host, "panel64", "Test Panel")).await;

    let registry = DeviceRegistry::new();
    let config = device_config(host);
    let driver: Arc<dyn pixoo_driver::Driver> = Arc::new(MockDriver::new(DisplayCapabilities::default()));
    let entry = registry.register(config.clone(), driver).await;

    let scenes = SceneRegistry::with_builtins().await;
    let publisher = ObservabilityPublisher::new();
    let factory: DriverFactory = Arc::new(|_, _| {
        Arc::new(MockDriver::new(DisplayCapabilities::default())) as Arc<dyn pixoo_driver::Driver>
    });

    let handle = Scheduler::spawn(config, Arc::clone(&entry), scenes, Arc::clone(&store), publisher, factory);
    (handle, store, registry)
}

fn device_entry_stub() -> Arc<DeviceEntry> {
    let config = device_config("unused");
    Arc::new(DeviceEntry::new(config, Arc::new(MockDriver::new(DisplayCapabilities::default()))))
}

#[tokio::test]
async fn switch_starts_scene_and_updates_store() {
    let (handle, store, _registry) = harness("10.0.0.1").await;

    handle.switch("static_text".to_owned(), Default::default(), true).await.expect("switch ok");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let device = store.device("10.0.0.1").await.expect("present");
    assert_eq!(device.active_scene.as_deref(), Some("static_text"));
    assert_eq!(device.play_state, PlayState::Playing);
    assert_eq!(device.generation_id, 1);
}

#[tokio::test]
async fn switch_to_unknown_scene_is_validation_error() {
    let (handle, _store, _registry) = harness("10.0.0.2").await;
    let err = handle.switch("no-such-scene".to_owned(), Default::default(), true).await.unwrap_err();
    assert_eq!(err, crate::error::FleetError::ValidationError);
}

#[tokio::test]
async fn stop_clears_active_scene() {
    let (handle, store, _registry) = harness("10.0.0.3").await;
    handle.switch("clock".to_owned(), Default::default(), true).await.expect("switch ok");
    tokio::time::sleep(Duration::from_millis(20)).await;

    handle.stop().await.expect("stop ok");
    tokio::time::sleep(Duration::from_millis(20)).await;

    let device = store.device("10.0.0.3").await.expect("present");
    assert_eq!(device.active_scene, None);
    assert_eq!(device.play_state, PlayState::Stopped);
}

#[tokio::test]
async fn pause_then_resume_preserves_generation() {
    let (handle, store, _registry) = harness("10.0.0.4").await;
    handle.switch("clock".to_owned(), Default::default(), true).await.expect("switch ok");
    tokio::time::sleep(Duration::from_millis(20)).await;
    let gen_before = store.device("10.0.0.4").await.expect("present").generation_id;

    handle.pause().await.expect("pause ok");
    let paused = store.device("10.0.0.4").await.expect("present");
    assert_eq!(paused.play_state, PlayState::Paused);

    handle.resume().await.expect("resume ok");
    let resumed = store.device("10.0.0.4").await.expect("present");
    assert_eq!(resumed.play_state, PlayState::Playing);
    assert_eq!(resumed.generation_id, gen_before);
}

#[tokio::test]
async fn set_brightness_on_capable_driver_updates_store() {
    let (handle, store, _registry) = harness("10.0.0.6").await;
    handle.set_brightness(42).await.expect("set brightness ok");
    let device = store.device("10.0.0.6").await.expect("present");
    assert_eq!(device.brightness, 42);
}

#[tokio::test]
async fn static_scene_completion_marks_complete_and_restart_reactivates() {
    let (handle, store, _registry) = harness("10.0.0.7").await;

    handle.switch("static_text".to_owned(), Default::default(), true).await.expect("switch ok");
    // Give the single render tick time to run and observe the null return.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let device = store.device("10.0.0.7").await.expect("present");
    assert_eq!(device.play_state, PlayState::Complete);
    assert_eq!(device.run_status, crate::store::RunStatus::Idle);
    let gen_before = device.generation_id;

    handle.restart().await.expect("restart ok");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let restarted = store.device("10.0.0.7").await.expect("present");
    assert_eq!(restarted.active_scene.as_deref(), Some("static_text"));
    assert_eq!(restarted.generation_id, gen_before + 1);
}

#[test]
fn device_entry_stub_is_constructible() {
    // Sanity check the stub builder compiles and produces a usable entry
    // for tests that only need a placeholder.
    let entry = device_entry_stub();
    assert_eq!(entry.config.device_type, "panel64");
}
