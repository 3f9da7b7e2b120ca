// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket control plane (spec.md §6), grounded in the teacher's
//! `crates/cli/src/transport/mod.rs` router assembly: a flat route table,
//! bearer-token auth as middleware, permissive CORS for the local web UI.

pub mod http;
pub mod nats;
pub mod ws;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use crate::observability::ObservabilityPublisher;
use crate::registry::DeviceRegistry;
use crate::router::Router as CommandRouter;
use crate::scene::SceneRegistry;
use crate::store::Store;

/// Everything an HTTP/WS handler needs to serve a request. Cheap to
/// clone (every field is an `Arc`), mirroring the teacher's `AppState`/
/// `MuxState`/`Store` pattern of bundling shared collaborators behind
/// `axum::extract::State`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub registry: Arc<DeviceRegistry>,
    pub scenes: Arc<SceneRegistry>,
    pub router: Arc<CommandRouter>,
    pub observability: Arc<ObservabilityPublisher>,
    pub auth_token: Option<String>,
}

/// Constant-time string comparison to prevent timing side-channel attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Validate a Bearer token from HTTP headers. `Ok(())` when auth is
/// disabled (`expected` is `None`) or the header matches.
pub fn validate_bearer(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else { return true };
    let Some(header) = headers.get("authorization").and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(token) = header.strip_prefix("Bearer ") else { return false };
    constant_time_eq(token, expected)
}

/// Validate a token carried on a WebSocket upgrade's `?token=...` query
/// param, since browsers cannot set an `Authorization` header on upgrade
/// requests.
pub fn validate_ws_token(token: Option<&str>, expected: Option<&str>) -> bool {
    match (token, expected) {
        (_, None) => true,
        (Some(token), Some(expected)) => constant_time_eq(token, expected),
        (None, Some(_)) => false,
    }
}

/// Axum middleware enforcing Bearer auth. The `/ws` upgrade is exempt
/// here (it authenticates via query param inside [`ws::ws_handler`]
/// instead, same split as the teacher's `auth_layer`).
async fn auth_layer(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if req.uri().path() == "/ws" {
        return next.run(req).await;
    }
    if !validate_bearer(req.headers(), state.auth_token.as_deref()) {
        let body = crate::error::FleetError::Unauthorized.to_error_body("unauthorized");
        return (StatusCode::UNAUTHORIZED, axum::Json(crate::error::ErrorResponse { error: body }))
            .into_response();
    }
    next.run(req).await
}

/// Build the axum `Router` serving spec.md §6's HTTP/REST surface plus
/// `/ws`.
pub fn build_router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/api/devices", get(http::list_devices))
        .route("/api/devices/{host}", get(http::get_device))
        .route("/api/devices/{host}/scene", post(http::switch_scene))
        .route("/api/devices/{host}/scene/pause", post(http::pause_scene))
        .route("/api/devices/{host}/scene/resume", post(http::resume_scene))
        .route("/api/devices/{host}/scene/stop", post(http::stop_scene))
        .route("/api/devices/{host}/scene/restart", post(http::restart_scene))
        .route("/api/devices/{host}/driver", post(http::set_driver))
        .route("/api/devices/{host}/display/power", post(http::set_power))
        .route("/api/devices/{host}/display/brightness", post(http::set_brightness))
        .route("/api/devices/{host}/reset", post(http::reset_device))
        .route("/api/scenes", get(http::list_scenes))
        .route("/api/status", get(http::status))
        .route("/api/restart", post(http::restart_all))
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
