// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Value types held by the State Store (spec.md §3 Data Model).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Process-wide counters and identity, the `global` namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalState {
    pub version: String,
    pub started_at_ms: u64,
    pub device_count: usize,
}

/// A device's play state (spec.md §3, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayState {
    Playing,
    Paused,
    Stopped,
    /// Reached only when the scene's last `render` returned `null`
    /// (spec.md §3 invariant). A subsequent `Restart` re-arms it.
    Complete,
}

/// Coarse device reachability, as tracked by the watchdog (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    Online,
    Offline,
    Unknown,
}

impl Default for Reachability {
    fn default() -> Self {
        Self::Unknown
    }
}

/// The Scheduler's state-machine status (spec.md §4.5: `running →
/// stopping → switching → running|idle`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Idle,
    Running,
    Stopping,
    Switching,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Idle
    }
}

/// Runtime state for one registered device — the `device[host]` namespace.
///
/// `active_scene`, `play_state`, `brightness`, `display_on`, and
/// `log_level` are the persisted subset (spec.md §6 "persisted state
/// layout"); `generation_id`, `run_status`, `reachability`, and
/// `consecutive_failures` are transient and reset on process restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRuntimeState {
    pub host: String,
    pub device_type: String,
    pub display_name: String,
    pub active_scene: Option<String>,
    pub target_scene: Option<String>,
    pub play_state: PlayState,
    pub brightness: u8,
    pub display_on: bool,
    pub log_level: String,
    #[serde(default)]
    pub generation_id: u64,
    #[serde(default)]
    pub run_status: RunStatus,
    #[serde(default)]
    pub reachability: Reachability,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default)]
    pub skipped_count: u64,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl DeviceRuntimeState {
    pub fn new(host: impl Into<String>, device_type: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            device_type: device_type.into(),
            display_name: display_name.into(),
            active_scene: None,
            target_scene: None,
            play_state: PlayState::Stopped,
            brightness: 100,
            display_on: true,
            log_level: "info".to_owned(),
            generation_id: 0,
            run_status: RunStatus::Idle,
            reachability: Reachability::Unknown,
            consecutive_failures: 0,
            skipped_count: 0,
            last_error: None,
        }
    }

    /// Apply a restored snapshot's persisted subset onto an otherwise
    /// freshly constructed entry (spec.md §4.3 `restore`).
    pub fn apply_persisted(&mut self, persisted: super::persist::PersistedDeviceFields) {
        self.active_scene = persisted.active_scene;
        self.play_state = persisted.play_state;
        self.brightness = persisted.brightness;
        self.display_on = persisted.display_on;
        self.log_level = persisted.log_level;
    }
}

/// Arbitrary, scene-owned key/value bag plus a small set of
/// framework-managed fields (spec.md §3 `SceneInstanceState`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneInstanceState {
    pub frame_count: u64,
    pub started_at_ms: u64,
    #[serde(default)]
    pub bag: Map<String, Value>,
}

impl SceneInstanceState {
    pub fn new() -> Self {
        Self::default()
    }
}
