// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The abstract `Driver` contract every display family implements
//! (spec.md §4.1).
//!
//! Object-safe async methods are expressed as `Pin<Box<dyn Future>>`
//! rather than via `async-trait`, matching `Detector` in the teacher's
//! `crates/cli/src/driver/mod.rs`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::capability::{DisplayCapabilities, Point, Rgba, TextAlign};
use crate::error::{DriverError, DriverResult};
use crate::metrics::{DriverMetrics, DriverMetricsSnapshot};

/// Outcome of a `push()`: the measured time to commit the buffer to hardware.
#[derive(Debug, Clone, Copy)]
pub struct PushResult {
    pub frametime_ms: u64,
}

/// Outcome of a `healthCheck()` (spec.md §4.1, §4.7).
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub ok: bool,
    pub latency_ms: u64,
    pub err: Option<String>,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Abstract representation of a physical (or mock) pixel display.
///
/// A `Device` owns exactly one boxed `Driver` at a time; hot-swap
/// (spec.md §4.2) replaces the box under the device's lock without
/// otherwise touching the device's runtime state.
pub trait Driver: Send + Sync {
    /// Bring the driver online (open sockets, validate config). Idempotent.
    fn initialize(&self) -> BoxFuture<'_, DriverResult<()>>;

    /// Cheap, non-blocking readiness probe — does not imply liveness.
    fn is_ready(&self) -> bool;

    /// Release resources. Never called concurrently with `push`/draw ops
    /// (the device lock serializes driver installation, spec.md §4.2).
    fn shutdown(&self) -> BoxFuture<'_, ()>;

    /// Reset the internal draw buffer to all-transparent/black.
    fn clear(&self) -> BoxFuture<'_, DriverResult<()>>;

    /// Commit the internal buffer to hardware. On success, updates
    /// `lastSeenTs` and returns the measured frame time (spec.md §4.8).
    fn push(&self) -> BoxFuture<'_, DriverResult<PushResult>>;

    fn draw_pixel(&self, at: Point, color: Rgba) -> DriverResult<()>;
    fn draw_line(&self, from: Point, to: Point, color: Rgba) -> DriverResult<()>;
    fn fill_rect(&self, top_left: Point, bottom_right: Point, color: Rgba) -> DriverResult<()>;

    /// Draw text. Drivers lacking `hasTextRendering` must return
    /// `DriverError::NotSupported` so callers can fall back to a bitmap
    /// font rendered via `draw_pixel` (spec.md §4.1).
    fn draw_text(&self, text: &str, at: Point, color: Rgba, align: TextAlign) -> DriverResult<()>;

    /// Optional: set display brightness 0..100. Capability-gated.
    fn set_brightness(&self, _level: u8) -> DriverResult<()> {
        Err(DriverError::NotSupported)
    }

    /// Optional: power the panel on/off. Capability-gated.
    fn set_display_power(&self, _on: bool) -> DriverResult<()> {
        Err(DriverError::NotSupported)
    }

    /// Optional: play a tone. Capability-gated.
    fn play_tone(&self, _freq_hz: u32, _ms: u32) -> DriverResult<()> {
        Err(DriverError::NotSupported)
    }

    /// Optional: show a built-in icon by id. Capability-gated.
    fn show_icon(&self, _id: &str) -> DriverResult<()> {
        Err(DriverError::NotSupported)
    }

    /// Cheap liveness probe independent of frame rendering. On success,
    /// updates `lastSeenTs` (spec.md §4.1, §4.7).
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;

    fn capabilities(&self) -> DisplayCapabilities;

    fn metrics(&self) -> Arc<DriverMetrics>;

    fn metrics_snapshot(&self) -> DriverMetricsSnapshot {
        self.metrics().snapshot()
    }
}

/// Which concrete driver kind backs a device, for config and hot-swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Real,
    Mock,
}
