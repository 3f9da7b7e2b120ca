// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;
use crate::store::{DeviceRuntimeState, GlobalState, Store};

#[test]
fn ping_deserializes_from_tagged_json() {
    let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).expect("parses");
    assert!(matches!(msg, ClientMessage::Ping));
}

#[test]
fn pong_serializes_with_snake_case_tag() {
    let json = serde_json::to_string(&ServerMessage::Pong).expect("serializes");
    assert_eq!(json, r#"{"type":"pong"}"#);
}

#[test]
fn metrics_update_serialization_carries_fields() {
    let tick = MetricsTick { host: "10.0.0.5".into(), scene_name: "clock".into(), frametime_ms: 12, generation_id: 3, ts: 0 };
    let json = serde_json::to_string(&metrics_to_msg(tick)).expect("serializes");
    assert!(json.contains("\"type\":\"metrics_update\""));
    assert!(json.contains("\"host\":\"10.0.0.5\""));
    assert!(json.contains("\"frametime_ms\":12"));
}

#[tokio::test]
async fn device_path_event_becomes_device_update() {
    let store = Store::new(GlobalState::default(), None, Duration::from_millis(10));
    store.insert_device("10.0.0.5", DeviceRuntimeState::new("10.0.0.5", "panel64", "Kitchen")).await;

    let state = AppState {
        store: std::sync::Arc::clone(&store),
        registry: crate::registry::DeviceRegistry::new(),
        scenes: crate::scene::SceneRegistry::new(),
        router: crate::router::Router::new("/home/pixoo"),
        observability: crate::observability::ObservabilityPublisher::new(),
        auth_token: None,
    };

    let event = StoreEvent {
        path: StorePath::device("10.0.0.5"),
        old: serde_json::Value::Null,
        new: serde_json::Value::Null,
    };
    let msg = store_event_to_msg(&state, &event).await.expect("device present");
    match msg {
        ServerMessage::DeviceUpdate { device } => assert_eq!(device.host, "10.0.0.5"),
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
async fn global_path_event_becomes_devices_update() {
    let store = Store::new(GlobalState::default(), None, Duration::from_millis(10));
    store.insert_device("10.0.0.5", DeviceRuntimeState::new("10.0.0.5", "panel64", "Kitchen")).await;

    let state = AppState {
        store: std::sync::Arc::clone(&store),
        registry: crate::registry::DeviceRegistry::new(),
        scenes: crate::scene::SceneRegistry::new(),
        router: crate::router::Router::new("/home/pixoo"),
        observability: crate::observability::ObservabilityPublisher::new(),
        auth_token: None,
    };

    let event = StoreEvent { path: StorePath::Global, old: serde_json::Value::Null, new: serde_json::Value::Null };
    let msg = store_event_to_msg(&state, &event).await.expect("devices present");
    match msg {
        ServerMessage::DevicesUpdate { devices } => assert_eq!(devices.len(), 1),
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
async fn scene_path_event_is_not_forwarded() {
    let store = Store::new(GlobalState::default(), None, Duration::from_millis(10));
    let state = AppState {
        store: std::sync::Arc::clone(&store),
        registry: crate::registry::DeviceRegistry::new(),
        scenes: crate::scene::SceneRegistry::new(),
        router: crate::router::Router::new("/home/pixoo"),
        observability: crate::observability::ObservabilityPublisher::new(),
        auth_token: None,
    };

    let event = StoreEvent {
        path: StorePath::scene("10.0.0.5", "clock"),
        old: serde_json::Value::Null,
        new: serde_json::Value::Null,
    };
    assert!(store_event_to_msg(&state, &event).await.is_none());
}
