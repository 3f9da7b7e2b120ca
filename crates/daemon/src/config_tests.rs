// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn loads_json_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("fleet.json");
    std::fs::write(
        &path,
        r#"{
            "devices": [
                { "host": "10.0.0.5", "deviceType": "panel64", "driver": "mock" }
            ],
            "mqtt": { "brokerUrl": "nats://localhost:4222", "topicBase": "/home/pixoo" }
        }"#,
    )
    .expect("write");

    let doc = FleetDocument::load(&path).expect("load");
    assert_eq!(doc.devices.len(), 1);
    assert_eq!(doc.devices[0].host, "10.0.0.5");
    assert_eq!(doc.mqtt.expect("mqtt").topic_base, "/home/pixoo");
}

#[test]
fn loads_yaml_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("fleet.yaml");
    std::fs::write(
        &path,
        "devices:\n  - host: clock-1\n    deviceType: clock32x8\n    driver: real\n",
    )
    .expect("write");

    let doc = FleetDocument::load(&path).expect("load");
    assert_eq!(doc.devices.len(), 1);
    assert_eq!(doc.devices[0].device_type, "clock32x8");
}

#[test]
fn missing_watchdog_fields_default_sensibly() {
    let json = r#"{ "timeoutMinutes": 5, "action": "restart" }"#;
    let policy: WatchdogPolicy = serde_json::from_str(json).expect("parse");
    assert!(policy.enabled);
    assert_eq!(policy.health_check_interval_seconds, 10);
    assert!(!policy.check_when_off);
}

#[test]
fn default_driver_kind_falls_back_to_mock() {
    let cfg = FleetConfig {
        host: "127.0.0.1".into(),
        port: 0,
        config_path: None,
        auth_token: None,
        default_driver: "bogus".into(),
        state_dir: None,
        persist_debounce_ms: 10_000,
        shutdown_timeout_ms: 5_000,
        device_override: None,
        log_level: "info".into(),
        log_format: LogFormat::Text,
    };
    assert_eq!(cfg.default_driver_kind(), DriverKind::Mock);
}
