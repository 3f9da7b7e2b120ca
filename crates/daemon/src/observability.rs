// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observability Publisher (spec.md §4.9): fans out state transitions and
//! per-frame metrics to any number of subscribers (WebSocket clients, the
//! MQTT/NATS transport) without ever blocking the Scheduler that calls it.
//!
//! Grounded in the teacher's `Aggregator` fan-out
//! (`crates/mux/src/transport/ws_mux.rs`): one bounded `broadcast::Sender`
//! per record kind, drop-oldest on a lagging subscriber.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::store::{DeviceRuntimeState, PlayState, Reachability, RunStatus};

/// Build metadata stamped onto every transition record, mirroring the
/// teacher's practice of publishing `buildNumber`/`gitCommit`/`version`
/// alongside application state for field debugging.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: String,
    pub git_commit: String,
    pub build_number: String,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_owned(),
            git_commit: option_env!("PIXOO_FLEETD_GIT_COMMIT").unwrap_or("unknown").to_owned(),
            build_number: option_env!("PIXOO_FLEETD_BUILD_NUMBER").unwrap_or("dev").to_owned(),
        }
    }
}

/// One state-transition record (spec.md §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransition {
    pub host: String,
    pub device_type: String,
    pub active_scene: Option<String>,
    pub target_scene: Option<String>,
    pub generation_id: u64,
    pub run_status: RunStatus,
    pub play_state: PlayState,
    pub reachability: Reachability,
    pub ts: u64,
    pub build_number: String,
    pub git_commit: String,
    pub version: String,
}

impl StateTransition {
    pub fn from_device(device: &DeviceRuntimeState) -> Self {
        Self::from_device_with_build(device, &BuildInfo::default())
    }

    pub fn from_device_with_build(device: &DeviceRuntimeState, build: &BuildInfo) -> Self {
        Self {
            host: device.host.clone(),
            device_type: device.device_type.clone(),
            active_scene: device.active_scene.clone(),
            target_scene: device.target_scene.clone(),
            generation_id: device.generation_id,
            run_status: device.run_status,
            play_state: device.play_state,
            reachability: device.reachability,
            ts: now_ms(),
            build_number: build.build_number.clone(),
            git_commit: build.git_commit.clone(),
            version: build.version.clone(),
        }
    }
}

/// One per-frame metrics tick (spec.md §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsTick {
    pub host: String,
    pub scene_name: String,
    pub frametime_ms: u64,
    pub generation_id: u64,
    pub ts: u64,
}

/// A Watchdog `mqtt-command` action (spec.md §4.7): a configured sequence
/// of payloads to publish to the outbound transport for one device. The
/// Watchdog never holds a transport handle itself — it hands the request
/// to the Observability Publisher, whose sinks (the NATS/MQTT transport)
/// are the only things that actually talk to the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttCommandRequest {
    pub host: String,
    pub sequence: Vec<serde_json::Value>,
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Channel capacity per record kind. A lagging subscriber drops its
/// oldest unread record rather than applying back-pressure to the
/// publisher (spec.md §4.9 invariant).
const CHANNEL_CAPACITY: usize = 512;

pub struct ObservabilityPublisher {
    transitions: broadcast::Sender<StateTransition>,
    metrics: broadcast::Sender<MetricsTick>,
    mqtt_commands: broadcast::Sender<MqttCommandRequest>,
    build: BuildInfo,
}

impl ObservabilityPublisher {
    pub fn new() -> std::sync::Arc<Self> {
        Self::with_build(BuildInfo::default())
    }

    pub fn with_build(build: BuildInfo) -> std::sync::Arc<Self> {
        let (transitions, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (metrics, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (mqtt_commands, _) = broadcast::channel(CHANNEL_CAPACITY);
        std::sync::Arc::new(Self { transitions, metrics, mqtt_commands, build })
    }

    pub fn subscribe_transitions(&self) -> broadcast::Receiver<StateTransition> {
        self.transitions.subscribe()
    }

    pub fn subscribe_metrics(&self) -> broadcast::Receiver<MetricsTick> {
        self.metrics.subscribe()
    }

    pub fn subscribe_mqtt_commands(&self) -> broadcast::Receiver<MqttCommandRequest> {
        self.mqtt_commands.subscribe()
    }

    pub async fn publish_transition(&self, mut transition: StateTransition) {
        transition.build_number = self.build.build_number.clone();
        transition.git_commit = self.build.git_commit.clone();
        transition.version = self.build.version.clone();
        let _ = self.transitions.send(transition);
    }

    pub async fn publish_metrics(&self, host: &str, scene_name: &str, frametime_ms: u64, generation_id: u64) {
        let _ = self.metrics.send(MetricsTick {
            host: host.to_owned(),
            scene_name: scene_name.to_owned(),
            frametime_ms,
            generation_id,
            ts: now_ms(),
        });
    }

    /// Publish a Watchdog `mqtt-command` action's configured sequence for
    /// a sink (the NATS/MQTT transport) to actually send.
    pub async fn publish_mqtt_command(&self, host: &str, sequence: Vec<serde_json::Value>) {
        let _ = self.mqtt_commands.send(MqttCommandRequest { host: host.to_owned(), sequence });
    }
}
