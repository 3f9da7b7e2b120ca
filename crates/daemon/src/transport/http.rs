// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP/REST handlers for the fleet control plane (spec.md §6), grounded
//! in the teacher's `crates/mux/src/transport/http.rs` handler shapes
//! (`State<Arc<_>>` + `Json<_>` extractors, one handler per route).

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use pixoo_driver::DriverKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::AppState;
use crate::error::FleetError;
use crate::observability::BuildInfo;
use crate::scene::SceneMetadata;
use crate::store::DeviceRuntimeState;

#[derive(Debug, Deserialize)]
pub struct ScenePayload {
    pub scene: String,
    #[serde(default)]
    pub clear: bool,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct DriverPayload {
    pub driver: DriverKind,
}

#[derive(Debug, Deserialize)]
pub struct PowerPayload {
    pub on: bool,
}

#[derive(Debug, Deserialize)]
pub struct BrightnessPayload {
    pub brightness: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub device_count: usize,
    pub uptime_secs: u64,
    pub version: String,
    pub git_commit: String,
    pub build_number: String,
}

#[derive(Debug, Serialize)]
pub struct RestartAllResponse {
    pub attempted: usize,
    pub failed: Vec<String>,
}

fn accepted(result: Result<(), FleetError>, host: &str) -> axum::response::Response {
    match result {
        Ok(()) => (axum::http::StatusCode::OK, Json(serde_json::json!({ "ok": true }))).into_response(),
        Err(e) => e.with_message(format!("command rejected for device {host}")).into_response(),
    }
}

/// `GET /api/devices`
pub async fn list_devices(State(state): State<AppState>) -> impl IntoResponse {
    let devices: Vec<DeviceRuntimeState> = state.store.all_devices().await.into_values().collect();
    Json(devices)
}

/// `GET /api/devices/:host`
pub async fn get_device(State(state): State<AppState>, Path(host): Path<String>) -> axum::response::Response {
    match state.store.device(&host).await {
        Some(device) => Json(device).into_response(),
        None => FleetError::DeviceNotFound.with_message(format!("no such device: {host}")).into_response(),
    }
}

/// `POST /api/devices/:host/scene`
pub async fn switch_scene(
    State(state): State<AppState>,
    Path(host): Path<String>,
    Json(payload): Json<ScenePayload>,
) -> axum::response::Response {
    accepted(state.router.http_switch(&host, payload.scene, payload.params, payload.clear).await, &host)
}

/// `POST /api/devices/:host/scene/pause`
pub async fn pause_scene(State(state): State<AppState>, Path(host): Path<String>) -> axum::response::Response {
    accepted(state.router.http_pause(&host).await, &host)
}

/// `POST /api/devices/:host/scene/resume`
pub async fn resume_scene(State(state): State<AppState>, Path(host): Path<String>) -> axum::response::Response {
    accepted(state.router.http_resume(&host).await, &host)
}

/// `POST /api/devices/:host/scene/stop`
pub async fn stop_scene(State(state): State<AppState>, Path(host): Path<String>) -> axum::response::Response {
    accepted(state.router.http_stop(&host).await, &host)
}

/// `POST /api/devices/:host/scene/restart`
pub async fn restart_scene(State(state): State<AppState>, Path(host): Path<String>) -> axum::response::Response {
    accepted(state.router.http_restart(&host).await, &host)
}

/// `POST /api/devices/:host/driver`
pub async fn set_driver(
    State(state): State<AppState>,
    Path(host): Path<String>,
    Json(payload): Json<DriverPayload>,
) -> axum::response::Response {
    accepted(state.router.http_set_driver(&host, payload.driver).await, &host)
}

/// `POST /api/devices/:host/display/power`
pub async fn set_power(
    State(state): State<AppState>,
    Path(host): Path<String>,
    Json(payload): Json<PowerPayload>,
) -> axum::response::Response {
    accepted(state.router.http_set_power(&host, payload.on).await, &host)
}

/// `POST /api/devices/:host/display/brightness`
pub async fn set_brightness(
    State(state): State<AppState>,
    Path(host): Path<String>,
    Json(payload): Json<BrightnessPayload>,
) -> axum::response::Response {
    accepted(state.router.http_set_brightness(&host, payload.brightness).await, &host)
}

/// `POST /api/devices/:host/reset`
pub async fn reset_device(State(state): State<AppState>, Path(host): Path<String>) -> axum::response::Response {
    accepted(state.router.http_reset(&host).await, &host)
}

#[derive(Debug, Deserialize)]
pub struct ListScenesQuery {
    pub device_type: Option<String>,
}

/// `GET /api/scenes?deviceType=panel64` — when `deviceType` is given,
/// returns only scenes whose `requiredCapabilities` are satisfiable on
/// that type (spec.md §4.4 `list(deviceType?)`), judged against the
/// capabilities of any already-registered device of that type; an
/// unregistered `deviceType` yields device-type-allow-list filtering only,
/// since no driver instance exists yet to report capabilities from.
pub async fn list_scenes(State(state): State<AppState>, Query(query): Query<ListScenesQuery>) -> impl IntoResponse {
    let Some(device_type) = query.device_type else {
        let metadata: Vec<SceneMetadata> = state.scenes.list().await.iter().map(|s| s.metadata().clone()).collect();
        return Json(metadata);
    };

    let mut caps = None;
    for entry in state.registry.list().await {
        if entry.config.device_type == device_type {
            caps = Some(entry.driver().await.capabilities());
            break;
        }
    }
    let caps = caps.unwrap_or_default();

    let metadata: Vec<SceneMetadata> = state
        .scenes
        .list_for_device(&device_type, &caps)
        .await
        .iter()
        .map(|s| s.metadata().clone())
        .collect();
    Json(metadata)
}

/// `GET /api/status`
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let global = state.store.global().await;
    let build = BuildInfo::default();
    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    Json(StatusResponse {
        status: "running".to_owned(),
        device_count: global.device_count,
        uptime_secs: now_ms.saturating_sub(global.started_at_ms) / 1000,
        version: build.version,
        git_commit: build.git_commit,
        build_number: build.build_number,
    })
}

/// `POST /api/restart` — restart every registered device's active scene
/// from scratch (spec.md §6; distinct from a per-device `.../scene/restart`,
/// this is the fleet-wide convenience endpoint). Individual failures are
/// collected rather than aborting the sweep.
pub async fn restart_all(State(state): State<AppState>) -> impl IntoResponse {
    let hosts = state.registry.hosts().await;
    let mut failed = Vec::new();
    for host in &hosts {
        if state.router.http_restart(host).await.is_err() {
            failed.push(host.clone());
        }
    }
    Json(RestartAllResponse { attempted: hosts.len(), failed })
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
