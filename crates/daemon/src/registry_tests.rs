// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pixoo_driver::MockDriver;

fn device_config(host: &str) -> DeviceConfig {
    DeviceConfig {
        host: host.to_owned(),
        device_type: "panel64".to_owned(),
        driver: Some(DriverKind::Mock),
        display_name: None,
        startup_scene: None,
        brightness: None,
        watchdog: None,
        scheduled_scenes: Vec::new(),
    }
}

fn mock_driver() -> Arc<dyn Driver> {
    Arc::new(MockDriver::new(Default::default()))
}

#[tokio::test]
async fn register_then_get_round_trips() {
    let registry = DeviceRegistry::new();
    registry.register(device_config("10.0.0.5"), mock_driver()).await;

    let entry = registry.get("10.0.0.5").await.expect("present");
    assert_eq!(entry.config.device_type, "panel64");
}

#[tokio::test]
async fn get_unknown_host_is_device_not_found() {
    let registry = DeviceRegistry::new();
    let err = registry.get("ghost").await.expect_err("missing");
    assert_eq!(err, FleetError::DeviceNotFound);
}

#[tokio::test]
async fn set_driver_replaces_bound_instance() {
    let registry = DeviceRegistry::new();
    let entry = registry.register(device_config("10.0.0.5"), mock_driver()).await;
    let original = entry.driver().await;

    registry.set_driver("10.0.0.5", mock_driver()).await.expect("swap ok");

    let swapped = entry.driver().await;
    assert!(!Arc::ptr_eq(&original, &swapped));
}

#[tokio::test]
async fn list_and_hosts_reflect_registered_devices() {
    let registry = DeviceRegistry::new();
    registry.register(device_config("a"), mock_driver()).await;
    registry.register(device_config("b"), mock_driver()).await;

    let hosts = registry.hosts().await;
    assert_eq!(hosts.len(), 2);
    assert_eq!(registry.list().await.len(), 2);
}
