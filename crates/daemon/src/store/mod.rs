// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The State Store (spec.md §4.3): process-wide source of truth for
//! `global`, `device[host]`, and `scene[host, sceneName]` state.
//!
//! Grounded in the teacher's `Aggregator` (`crates/mux/src/state.rs`, a
//! bounded `broadcast::Sender` fanning out change events — "subscribers
//! never block the publisher") and `credential/persist.rs` (atomic
//! write-tmp-then-rename snapshot persistence).

mod path;
mod persist;
mod types;

pub use path::Path;
pub use persist::PersistedSnapshot;
pub use types::{DeviceRuntimeState, GlobalState, PlayState, Reachability, RunStatus, SceneInstanceState};

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::warn;

/// A single observed mutation, delivered to subscribers after the owning
/// lock is released (spec.md §4.3 invariant).
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub path: Path,
    pub old: Value,
    pub new: Value,
}

/// The process-wide State Store.
pub struct Store {
    global: RwLock<GlobalState>,
    devices: RwLock<HashMap<String, DeviceRuntimeState>>,
    scenes: RwLock<HashMap<(String, String), SceneInstanceState>>,
    events_tx: broadcast::Sender<StoreEvent>,
    persist: Arc<persist::Debouncer>,
    self_ref: Weak<Store>,
}

impl Store {
    pub fn new(
        global: GlobalState,
        persist_dir: Option<std::path::PathBuf>,
        debounce: std::time::Duration,
    ) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(256);
        Arc::new_cyclic(|self_ref| Self {
            global: RwLock::new(global),
            devices: RwLock::new(HashMap::new()),
            scenes: RwLock::new(HashMap::new()),
            events_tx,
            persist: persist::Debouncer::new(persist_dir, debounce),
            self_ref: self_ref.clone(),
        })
    }

    /// Restore any previously persisted snapshot from disk, if a state
    /// directory was configured (spec.md §4.3 "on startup, restore").
    pub fn load_persisted(persist_dir: Option<&std::path::Path>) -> Option<PersistedSnapshot> {
        persist_dir.and_then(persist::read)
    }

    /// Subscribe to every mutation the store makes, regardless of prefix.
    /// Callers filter by [`Path`] themselves, mirroring the teacher's
    /// `Aggregator::subscribe` + per-connection `MuxFilter`.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events_tx.subscribe()
    }

    fn publish(&self, path: Path, old: Value, new: Value) {
        // A lagged/full subscriber is dropped from the channel's own
        // ring buffer (broadcast's drop-oldest semantics) — the publisher
        // never blocks, matching spec.md §4.9's "drop-oldest on a bounded
        // per-subscriber queue".
        let _ = self.events_tx.send(StoreEvent { path, old, new });
    }

    fn mark_dirty(&self) {
        let Some(this) = self.self_ref.upgrade() else { return };
        let for_snapshot = Arc::clone(&this);
        self.persist.mark_dirty(move || async move { for_snapshot.snapshot().await });
    }

    // -- global -----------------------------------------------------------

    pub async fn global(&self) -> GlobalState {
        self.global.read().await.clone()
    }

    pub async fn update_global<F>(&self, f: F)
    where
        F: FnOnce(&mut GlobalState),
    {
        let (old, new) = {
            let mut guard = self.global.write().await;
            let old = serde_json::to_value(&*guard).unwrap_or(Value::Null);
            f(&mut guard);
            let new = serde_json::to_value(&*guard).unwrap_or(Value::Null);
            (old, new)
        };
        self.publish(Path::Global, old, new);
    }

    // -- device -------------------------------------------------------------

    /// Per-device lock: mutations to one device's sub-tree are serialized
    /// by virtue of holding the single `devices` map lock only for the
    /// duration of the closure (spec.md §4.3 invariant 1).
    pub async fn device(&self, host: &str) -> Option<DeviceRuntimeState> {
        self.devices.read().await.get(host).cloned()
    }

    pub async fn insert_device(&self, host: &str, state: DeviceRuntimeState) {
        let new = serde_json::to_value(&state).unwrap_or(Value::Null);
        self.devices.write().await.insert(host.to_owned(), state);
        self.publish(Path::device(host), Value::Null, new);
        self.mark_dirty();
    }

    pub async fn remove_device(&self, host: &str) {
        let removed = self.devices.write().await.remove(host);
        if let Some(removed) = removed {
            let old = serde_json::to_value(removed).unwrap_or(Value::Null);
            self.publish(Path::device(host), old, Value::Null);
            self.mark_dirty();
        }
    }

    /// Atomic read-modify-write on one device's state (spec.md §4.3
    /// `update(path, fn)`).
    pub async fn update_device<F>(&self, host: &str, f: F)
    where
        F: FnOnce(&mut DeviceRuntimeState),
    {
        let (old, new) = {
            let mut guard = self.devices.write().await;
            let Some(entry) = guard.get_mut(host) else {
                warn!(host, "update_device on unknown device");
                return;
            };
            let old = serde_json::to_value(&*entry).unwrap_or(Value::Null);
            f(entry);
            let new = serde_json::to_value(&*entry).unwrap_or(Value::Null);
            (old, new)
        };
        self.publish(Path::device(host), old, new);
        self.mark_dirty();
    }

    pub async fn all_devices(&self) -> HashMap<String, DeviceRuntimeState> {
        self.devices.read().await.clone()
    }

    // -- scene instance state ------------------------------------------------

    pub async fn scene_state(&self, host: &str, scene: &str) -> Option<SceneInstanceState> {
        self.scenes.read().await.get(&(host.to_owned(), scene.to_owned())).cloned()
    }

    pub async fn update_scene_state<F>(&self, host: &str, scene: &str, f: F)
    where
        F: FnOnce(&mut SceneInstanceState),
    {
        let key = (host.to_owned(), scene.to_owned());
        let (old, new) = {
            let mut guard = self.scenes.write().await;
            let entry = guard.entry(key).or_insert_with(SceneInstanceState::new);
            let old = serde_json::to_value(&*entry).unwrap_or(Value::Null);
            f(entry);
            let new = serde_json::to_value(&*entry).unwrap_or(Value::Null);
            (old, new)
        };
        self.publish(Path::scene(host, scene), old, new);
    }

    /// Clear scene state — called on `cleanup` or when a scene is removed
    /// from a device (spec.md §3 `SceneInstanceState` lifecycle).
    pub async fn clear_scene_state(&self, host: &str, scene: &str) {
        self.scenes.write().await.remove(&(host.to_owned(), scene.to_owned()));
    }

    // -- generic dotted-path addressing (spec.md §4.3 `get`/`set`) ----------

    /// Read via [`Path`], falling back to `default` for missing fields.
    /// Host/scene-name segments are never dot-split — see [`Path`]'s
    /// doc comment and DESIGN.md OQ-2 for why flat dotted strings are not
    /// used as the wire form.
    pub async fn get_path(&self, path: &Path, default: Value) -> Value {
        match path {
            Path::Global => serde_json::to_value(self.global().await).unwrap_or(default),
            Path::Device(host) => {
                self.device(host).await.and_then(|d| serde_json::to_value(d).ok()).unwrap_or(default)
            }
            Path::Scene(host, scene) => self
                .scene_state(host, scene)
                .await
                .and_then(|s| serde_json::to_value(s).ok())
                .unwrap_or(default),
        }
    }

    // -- snapshot / restore (spec.md §4.3, narrow persistence §3) ----------

    pub async fn snapshot(&self) -> PersistedSnapshot {
        let devices = self.devices.read().await;
        let mut out = HashMap::with_capacity(devices.len());
        for (host, state) in devices.iter() {
            out.insert(
                host.clone(),
                persist::PersistedDeviceFields {
                    active_scene: state.active_scene.clone(),
                    play_state: state.play_state,
                    brightness: state.brightness,
                    display_on: state.display_on,
                    log_level: state.log_level.clone(),
                },
            );
        }
        PersistedSnapshot { version: persist::SNAPSHOT_VERSION, devices: out }
    }

    /// Restore persisted fields onto already-registered devices. Unknown
    /// devices in the snapshot are ignored (the registry, not the store,
    /// is authoritative for which devices exist); transient fields
    /// (`generationId`, `status`, metrics) are left at their defaults.
    pub async fn restore(&self, snapshot: PersistedSnapshot) {
        let mut guard = self.devices.write().await;
        for (host, persisted) in snapshot.devices {
            if let Some(entry) = guard.get_mut(&host) {
                entry.apply_persisted(persisted);
            }
        }
    }

    /// Flush the debounced snapshot synchronously — called on shutdown
    /// (spec.md §4.3: "on shutdown, flush synchronously").
    pub async fn flush_persistence(&self) {
        let snap = self.snapshot().await;
        self.persist.flush_now(&snap);
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
