// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Scene abstraction (spec.md §4.4): pluggable content generators the
//! Scheduler drives through an `init` / `render` / `cleanup` lifecycle.
//!
//! Mirrors the object-safe async pattern used throughout `pixoo-driver`'s
//! `Driver` trait (itself grounded in the teacher's `cli/src/driver/mod.rs`
//! `Detector` trait): no `async-trait`, just a hand-written boxed future.

mod builtin;
mod registry;

pub use builtin::{clock_scene, static_text_scene};
pub use registry::SceneRegistry;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use pixoo_driver::{DisplayCapabilities, Driver, DriverResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::Store;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Why a scene could not be started or could not continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The target device lacks a capability this scene requires.
    MissingCapability(&'static str),
    /// The device's `deviceType` is not on the scene's allow-list.
    DeviceTypeNotAllowed,
    /// The underlying driver call failed.
    Driver(String),
    /// The scene's own render logic failed.
    Render(String),
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCapability(cap) => write!(f, "device lacks required capability: {cap}"),
            Self::DeviceTypeNotAllowed => write!(f, "scene not allowed on this device type"),
            Self::Driver(msg) => write!(f, "driver error: {msg}"),
            Self::Render(msg) => write!(f, "scene render error: {msg}"),
        }
    }
}

impl std::error::Error for SceneError {}

/// Static description of a scene, independent of any running instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneMetadata {
    pub id: String,
    pub display_name: String,
    pub description: String,
    #[serde(default)]
    pub timing: SceneTiming,
    #[serde(default)]
    pub schedule: Option<ScheduleWindow>,
}

/// Per-scene timing knobs a scene author declares up front (spec.md §4.5
/// "Adaptive timing (optional, per scene config)" and "Timeouts").
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneTiming {
    /// When set, the Scheduler widens the next interval to
    /// `max(next, t_render * 1.05)` to avoid overruns (spec.md §4.5).
    #[serde(default)]
    pub adaptive_timing: bool,
    /// Auto-stop budget since `lastSwitchTs` (spec.md §4.5 "Timeouts").
    #[serde(default)]
    pub scene_timeout_minutes: Option<u64>,
}

/// Weekday mask + daily window scheduling metadata (spec.md §4.5
/// "Schedule gating"). Evaluated against local time each minute (DESIGN.md
/// OQ-4: DST transitions are not specified in source; local-time
/// evaluation is the documented choice here).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleWindow {
    /// Bit 0 = Monday .. bit 6 = Sunday.
    pub weekday_mask: u8,
    pub start_minute_of_day: u16,
    pub end_minute_of_day: u16,
}

impl ScheduleWindow {
    /// Whether `minute_of_day` on `weekday` (0=Monday..6=Sunday) falls
    /// inside this window. A window that wraps past midnight
    /// (`end < start`) is treated as spanning into the next day.
    pub fn contains(&self, weekday: u8, minute_of_day: u16) -> bool {
        if self.weekday_mask & (1 << weekday.min(6)) == 0 {
            return false;
        }
        if self.start_minute_of_day <= self.end_minute_of_day {
            (self.start_minute_of_day..self.end_minute_of_day).contains(&minute_of_day)
        } else {
            minute_of_day >= self.start_minute_of_day || minute_of_day < self.end_minute_of_day
        }
    }
}

/// Capability and device-type gating a scene declares up front (spec.md
/// §4.4 "capability requirements").
#[derive(Debug, Clone, Default)]
pub struct SceneRequirements {
    pub needs_text_rendering: bool,
    pub needs_primitive_drawing: bool,
    pub needs_audio: bool,
    pub needs_icon_support: bool,
    /// Empty means "any device type is allowed".
    pub allowed_device_types: Vec<String>,
}

impl SceneRequirements {
    pub fn check(&self, device_type: &str, caps: &DisplayCapabilities) -> Result<(), SceneError> {
        if !self.allowed_device_types.is_empty() && !self.allowed_device_types.iter().any(|t| t == device_type) {
            return Err(SceneError::DeviceTypeNotAllowed);
        }
        if self.needs_text_rendering && !caps.has_text_rendering {
            return Err(SceneError::MissingCapability("textRendering"));
        }
        if self.needs_primitive_drawing && !caps.has_primitive_drawing {
            return Err(SceneError::MissingCapability("primitiveDrawing"));
        }
        if self.needs_audio && !caps.has_audio {
            return Err(SceneError::MissingCapability("audio"));
        }
        if self.needs_icon_support && !caps.has_icon_support {
            return Err(SceneError::MissingCapability("iconSupport"));
        }
        Ok(())
    }
}

/// What a scene renders into and reads state from, for one tick.
pub struct SceneContext {
    pub host: String,
    pub device_type: String,
    pub driver: Arc<dyn Driver>,
    pub capabilities: DisplayCapabilities,
    pub store: Arc<Store>,
    pub scene_id: String,
    /// The params the scene was switched on with (spec.md §4.5 `switch`).
    pub params: Map<String, Value>,
    pub now_ms: u64,
}

impl SceneContext {
    pub async fn bag(&self) -> Map<String, Value> {
        self.store.scene_state(&self.host, &self.scene_id).await.map(|s| s.bag).unwrap_or_default()
    }

    pub async fn set_bag_entry(&self, key: &str, value: Value) {
        let key = key.to_owned();
        self.store
            .update_scene_state(&self.host, &self.scene_id, move |s| {
                s.bag.insert(key, value);
            })
            .await;
    }

    pub async fn touch_frame(&self) {
        self.store.update_scene_state(&self.host, &self.scene_id, |s| s.frame_count += 1).await;
    }
}

/// What a render call asks the Scheduler to do next (spec.md §4.5
/// "adaptive timing").
pub struct RenderOutcome {
    /// Milliseconds until the next render, clamped by the Scheduler to
    /// the device's `minDelayMs`.
    pub next_delay_ms: u64,
}

impl RenderOutcome {
    pub fn after(ms: u64) -> Self {
        Self { next_delay_ms: ms }
    }
}

/// A pluggable scene. `init`/`render`/`cleanup` mirror `Driver`'s
/// object-safe async methods.
pub trait Scene: Send + Sync {
    fn metadata(&self) -> &SceneMetadata;
    fn requirements(&self) -> &SceneRequirements;

    fn init<'a>(&'a self, ctx: &'a SceneContext) -> BoxFuture<'a, Result<(), SceneError>>;

    /// `Ok(Some(outcome))` schedules another tick after `outcome.next_delay_ms`;
    /// `Ok(None)` is the scene's "done" signal (spec.md §3 `render`
    /// returns `nextDelayMs|null`) and drives `playState` to `complete`.
    fn render<'a>(&'a self, ctx: &'a SceneContext) -> BoxFuture<'a, Result<Option<RenderOutcome>, SceneError>>;
    fn cleanup<'a>(&'a self, ctx: &'a SceneContext) -> BoxFuture<'a, ()>;
}

/// Helper for draw calls a scene issues against capability-gated driver
/// operations, turning any `DriverError` into a `SceneError` uniformly.
pub(crate) fn gate<T>(op: DriverResult<T>) -> Result<T, SceneError> {
    op.map_err(|e| SceneError::Driver(e.to_string()))
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
