// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket control-plane feed (spec.md §6): server-initiated `init`,
//! `devices_update`, `device_update`, `scene_switch`, `metrics_update`,
//! `pong`; client sends `ping`.
//!
//! Grounded in the teacher's `transport/ws.rs` per-connection event loop
//! (`tokio::select!` across several `broadcast::Receiver`s plus the
//! socket's own read half) and `ws_msg.rs`'s internally-tagged message
//! enums.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use super::{validate_ws_token, AppState};
use crate::observability::MetricsTick;
use crate::scene::SceneMetadata;
use crate::store::{DeviceRuntimeState, Path as StorePath, StoreEvent};

/// Server-to-client messages (spec.md §6 `/ws` contract).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Init { devices: Vec<DeviceRuntimeState>, scenes: Vec<SceneMetadata> },
    DevicesUpdate { devices: Vec<DeviceRuntimeState> },
    DeviceUpdate { device: DeviceRuntimeState },
    SceneSwitch { host: String, scene: Option<String>, generation_id: u64 },
    MetricsUpdate { host: String, scene_name: String, frametime_ms: u64, generation_id: u64 },
    Pong,
    Error { message: String },
}

/// Client-to-server messages.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if !validate_ws_token(query.token.as_deref(), state.auth_token.as_deref()) {
        return axum::http::Response::builder()
            .status(401)
            .body(axum::body::Body::from("unauthorized"))
            .unwrap_or_default()
            .into_response();
    }
    ws.on_upgrade(move |socket| handle_connection(state, socket)).into_response()
}

async fn handle_connection(state: AppState, socket: WebSocket) {
    let (mut tx, mut rx) = socket.split();
    let mut store_events = state.store.subscribe();
    let mut transitions = state.observability.subscribe_transitions();
    let mut metrics = state.observability.subscribe_metrics();

    let devices = state.store.all_devices().await.into_values().collect();
    let scenes = state.scenes.list().await.iter().map(|s| s.metadata()).collect();
    if send_json(&mut tx, &ServerMessage::Init { devices, scenes }).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = store_events.recv() => {
                let Ok(event) = event else { continue };
                let Some(msg) = store_event_to_msg(&state, &event).await else { continue };
                if send_json(&mut tx, &msg).await.is_err() {
                    break;
                }
            }
            transition = transitions.recv() => {
                let Ok(transition) = transition else { continue };
                let msg = ServerMessage::SceneSwitch {
                    host: transition.host,
                    scene: transition.active_scene,
                    generation_id: transition.generation_id,
                };
                if send_json(&mut tx, &msg).await.is_err() {
                    break;
                }
            }
            tick = metrics.recv() => {
                let Ok(tick) = tick else { continue };
                let msg = metrics_to_msg(tick);
                if send_json(&mut tx, &msg).await.is_err() {
                    break;
                }
            }
            incoming = rx.next() => {
                let Some(Ok(message)) = incoming else { break };
                match message {
                    Message::Text(text) => {
                        if handle_client_message(&mut tx, &text).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }
}

async fn store_event_to_msg(state: &AppState, event: &StoreEvent) -> Option<ServerMessage> {
    match &event.path {
        StorePath::Device(host) => {
            let device = state.store.device(host).await?;
            Some(ServerMessage::DeviceUpdate { device })
        }
        StorePath::Global => {
            let devices = state.store.all_devices().await.into_values().collect();
            Some(ServerMessage::DevicesUpdate { devices })
        }
        StorePath::Scene(_, _) => None,
    }
}

fn metrics_to_msg(tick: MetricsTick) -> ServerMessage {
    ServerMessage::MetricsUpdate {
        host: tick.host,
        scene_name: tick.scene_name,
        frametime_ms: tick.frametime_ms,
        generation_id: tick.generation_id,
    }
}

async fn handle_client_message<S>(tx: &mut S, text: &str) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let parsed: Result<ClientMessage, _> = serde_json::from_str(text);
    match parsed {
        Ok(ClientMessage::Ping) => send_json(tx, &ServerMessage::Pong).await,
        Err(_) => send_json(tx, &ServerMessage::Error { message: "invalid message".to_owned() }).await,
    }
}

async fn send_json<S>(tx: &mut S, msg: &ServerMessage) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let text = serde_json::to_string(msg).map_err(|_| ())?;
    tx.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
