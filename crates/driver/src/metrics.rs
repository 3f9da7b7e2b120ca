// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-driver frame accounting (spec.md §3 `DriverMetrics`, §4.8).

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters a driver owns and updates on every `push`/`healthCheck`.
///
/// Grounded in the teacher's `RegisteredPod` liveness fields
/// (`crates/cli/src/broker/registry.rs`) and `SessionEntry::health_failures`
/// (`crates/mux/src/state.rs`): plain atomics behind an `Arc`-shared struct
/// rather than a lock, since every field here is written from exactly one
/// place (the driver's own `push`/`healthCheck`) and read from many.
#[derive(Debug, Default)]
pub struct DriverMetrics {
    pushes: AtomicU64,
    errors: AtomicU64,
    skipped: AtomicU64,
    last_frametime_ms: AtomicU64,
    last_seen_ts_ms: AtomicU64,
}

/// Serializable snapshot of [`DriverMetrics`] for the State Store / HTTP API.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DriverMetricsSnapshot {
    pub pushes: u64,
    pub errors: u64,
    pub skipped: u64,
    pub last_frametime_ms: u64,
    pub last_seen_ts_ms: u64,
}

impl DriverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_push(&self, frametime_ms: u64, now_ms: u64) {
        self.pushes.fetch_add(1, Ordering::Relaxed);
        self.last_frametime_ms.store(frametime_ms, Ordering::Relaxed);
        self.last_seen_ts_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Update `lastSeenTs` independent of a push (e.g. a successful
    /// `healthCheck`) without touching frame counters.
    pub fn touch_seen(&self, now_ms: u64) {
        self.last_seen_ts_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn last_seen_ts_ms(&self) -> u64 {
        self.last_seen_ts_ms.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> DriverMetricsSnapshot {
        DriverMetricsSnapshot {
            pushes: self.pushes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            last_frametime_ms: self.last_frametime_ms.load(Ordering::Relaxed),
            last_seen_ts_ms: self.last_seen_ts_ms.load(Ordering::Relaxed),
        }
    }
}
