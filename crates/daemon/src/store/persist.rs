// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debounced, atomic persistence of the store's persisted subset.
//!
//! Grounded in the teacher's `credential/persist.rs`: writes go to a
//! sibling `.tmp` file followed by `rename`, so a crash mid-write never
//! leaves a half-written snapshot on disk.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::PlayState;

/// The on-disk document (spec.md §6 "persisted state layout").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub version: u32,
    pub devices: HashMap<String, PersistedDeviceFields>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedDeviceFields {
    pub active_scene: Option<String>,
    pub play_state: PlayState,
    pub brightness: u8,
    pub display_on: bool,
    pub log_level: String,
}

pub const SNAPSHOT_VERSION: u32 = 1;

pub fn write_atomic(dir: &std::path::Path, snapshot: &PersistedSnapshot) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let final_path = dir.join("state.json");
    let tmp_path = dir.join("state.json.tmp");
    let body = serde_json::to_vec_pretty(snapshot)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(&tmp_path, body)?;
    std::fs::rename(&tmp_path, &final_path)?;
    Ok(())
}

pub fn read(dir: &std::path::Path) -> Option<PersistedSnapshot> {
    let path = dir.join("state.json");
    let contents = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(snap) => Some(snap),
        Err(err) => {
            warn!(%err, path = %path.display(), "ignoring unreadable persisted snapshot");
            None
        }
    }
}

/// Single-timer-per-writer debounce (spec.md §9): every mutation
/// reschedules the pending flush rather than stacking up new ones.
pub struct Debouncer {
    dir: Option<PathBuf>,
    interval: Duration,
    pending: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(dir: Option<PathBuf>, interval: Duration) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self { dir, interval, pending: tokio::sync::Mutex::new(None) })
    }

    /// Reschedule the debounced flush. `snapshot_fn` is re-invoked when the
    /// timer actually fires, so it observes the latest state rather than
    /// whatever was current when `mark_dirty` was called.
    pub fn mark_dirty<F, Fut>(self: &std::sync::Arc<Self>, snapshot_fn: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = PersistedSnapshot> + Send + 'static,
    {
        let Some(dir) = self.dir.clone() else { return };
        let interval = self.interval;
        let this = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            let mut guard = this.pending.lock().await;
            if let Some(handle) = guard.take() {
                handle.abort();
            }
            *guard = Some(tokio::spawn(async move {
                tokio::time::sleep(interval).await;
                let snapshot = snapshot_fn().await;
                if let Err(err) = write_atomic(&dir, &snapshot) {
                    warn!(%err, "failed to persist state snapshot");
                } else {
                    debug!(devices = snapshot.devices.len(), "persisted state snapshot");
                }
            }));
        });
    }

    pub fn flush_now(&self, snapshot: &PersistedSnapshot) {
        let Some(dir) = self.dir.as_ref() else { return };
        if let Err(err) = write_atomic(dir, snapshot) {
            warn!(%err, "failed to flush state snapshot on shutdown");
        }
    }
}
