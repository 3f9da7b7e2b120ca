// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory driver with no I/O, for testing and for standing in for
//! offline devices without changing code paths (spec.md §4.1).
//!
//! Grounded in the teacher-pack's mock display drivers:
//! `examples/other_examples/.../LyMonS__src-display-drivers-mock.rs.rs` and
//! `examples/other_examples/.../nickgeoca-eeg-driver__...mock_driver.rs.rs`.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::capability::{DisplayCapabilities, Point, Rgba, TextAlign};
use crate::driver::{Driver, HealthStatus, PushResult};
use crate::error::{DriverError, DriverResult};
use crate::metrics::DriverMetrics;

/// Call-count bookkeeping exposed for test assertions.
#[derive(Debug, Default)]
pub struct MockDriverState {
    pub init_count: u64,
    pub clear_count: u64,
    pub shutdown_count: u64,
    pub last_brightness: Option<u8>,
    pub last_power: Option<bool>,
    pub simulate_push_failure: bool,
    pub simulate_health_failure: bool,
}

/// Mock driver: structurally identical to a real one, performs no I/O.
pub struct MockDriver {
    capabilities: DisplayCapabilities,
    metrics: Arc<DriverMetrics>,
    state: Mutex<MockDriverState>,
    ready: std::sync::atomic::AtomicBool,
    epoch_ms: AtomicU64,
}

impl MockDriver {
    pub fn new(capabilities: DisplayCapabilities) -> Self {
        Self {
            capabilities,
            metrics: Arc::new(DriverMetrics::new()),
            state: Mutex::new(MockDriverState::default()),
            ready: std::sync::atomic::AtomicBool::new(false),
            epoch_ms: AtomicU64::new(0),
        }
    }

    /// Tests advance the mock's simulated clock explicitly rather than
    /// reading the wall clock, keeping generation/stale-tick tests
    /// deterministic.
    pub fn set_clock_ms(&self, ms: u64) {
        self.epoch_ms.store(ms, Ordering::Relaxed);
    }

    fn now_ms(&self) -> u64 {
        self.epoch_ms.load(Ordering::Relaxed)
    }

    /// Snapshot call counts for test assertions.
    pub fn state(&self) -> std::sync::MutexGuard<'_, MockDriverState> {
        #[allow(clippy::unwrap_used)]
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_simulate_push_failure(&self, fail: bool) {
        self.state().simulate_push_failure = fail;
    }

    pub fn set_simulate_health_failure(&self, fail: bool) {
        self.state().simulate_health_failure = fail;
    }
}

impl Driver for MockDriver {
    fn initialize(&self) -> Pin<Box<dyn Future<Output = DriverResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.state().init_count += 1;
            self.ready.store(true, Ordering::Release);
            Ok(())
        })
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn shutdown(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.state().shutdown_count += 1;
            self.ready.store(false, Ordering::Release);
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = DriverResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.state().clear_count += 1;
            Ok(())
        })
    }

    fn push(&self) -> Pin<Box<dyn Future<Output = DriverResult<PushResult>> + Send + '_>> {
        Box::pin(async move {
            if self.state().simulate_push_failure {
                self.metrics.record_error();
                return Err(DriverError::Transport("simulated push failure".into()));
            }
            let frametime_ms = 1;
            self.metrics.record_push(frametime_ms, self.now_ms());
            Ok(PushResult { frametime_ms })
        })
    }

    fn draw_pixel(&self, _at: Point, _color: Rgba) -> DriverResult<()> {
        Ok(())
    }

    fn draw_line(&self, _from: Point, _to: Point, _color: Rgba) -> DriverResult<()> {
        Ok(())
    }

    fn fill_rect(&self, _top_left: Point, _bottom_right: Point, _color: Rgba) -> DriverResult<()> {
        Ok(())
    }

    fn draw_text(&self, _text: &str, _at: Point, _color: Rgba, _align: TextAlign) -> DriverResult<()> {
        if !self.capabilities.has_text_rendering {
            return Err(DriverError::NotSupported);
        }
        Ok(())
    }

    fn set_brightness(&self, level: u8) -> DriverResult<()> {
        if !self.capabilities.has_brightness_control {
            return Err(DriverError::NotSupported);
        }
        self.state().last_brightness = Some(level);
        Ok(())
    }

    fn set_display_power(&self, on: bool) -> DriverResult<()> {
        self.state().last_power = Some(on);
        Ok(())
    }

    fn play_tone(&self, _freq_hz: u32, _ms: u32) -> DriverResult<()> {
        if !self.capabilities.has_audio {
            return Err(DriverError::NotSupported);
        }
        Ok(())
    }

    fn show_icon(&self, _id: &str) -> DriverResult<()> {
        if !self.capabilities.has_icon_support {
            return Err(DriverError::NotSupported);
        }
        Ok(())
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + '_>> {
        Box::pin(async move {
            if self.state().simulate_health_failure {
                return HealthStatus { ok: false, latency_ms: 0, err: Some("simulated health failure".into()) };
            }
            // Simulated small constant latency, per spec.md §4.1.
            self.metrics.touch_seen(self.now_ms());
            HealthStatus { ok: true, latency_ms: 2, err: None }
        })
    }

    fn capabilities(&self) -> DisplayCapabilities {
        self.capabilities
    }

    fn metrics(&self) -> Arc<DriverMetrics> {
        Arc::clone(&self.metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ColorDepth;

    fn caps() -> DisplayCapabilities {
        DisplayCapabilities {
            width: 64,
            height: 64,
            color_depth: ColorDepth::Rgba32,
            has_audio: true,
            has_text_rendering: true,
            has_primitive_drawing: true,
            has_icon_support: true,
            has_brightness_control: true,
            min_brightness: 0,
            max_brightness: 100,
            max_fps: 30,
        }
    }

    #[tokio::test]
    async fn push_updates_metrics_and_last_seen() {
        let d = MockDriver::new(caps());
        d.set_clock_ms(500);
        d.initialize().await.expect("init");
        let res = d.push().await.expect("push");
        assert_eq!(res.frametime_ms, 1);
        assert_eq!(d.metrics().snapshot().pushes, 1);
        assert_eq!(d.metrics().last_seen_ts_ms(), 500);
    }

    #[tokio::test]
    async fn simulated_push_failure_counts_error_not_seen() {
        let d = MockDriver::new(caps());
        d.set_clock_ms(10);
        d.set_simulate_push_failure(true);
        let err = d.push().await.expect_err("should fail");
        assert!(matches!(err, DriverError::Transport(_)));
        assert_eq!(d.metrics().snapshot().errors, 1);
        assert_eq!(d.metrics().last_seen_ts_ms(), 0);
    }

    #[test]
    fn capability_gated_ops_return_not_supported() {
        let mut caps = caps();
        caps.has_audio = false;
        caps.has_icon_support = false;
        caps.has_brightness_control = false;
        let d = MockDriver::new(caps);
        assert!(matches!(d.play_tone(440, 100), Err(DriverError::NotSupported)));
        assert!(matches!(d.show_icon("smiley"), Err(DriverError::NotSupported)));
        assert!(matches!(d.set_brightness(50), Err(DriverError::NotSupported)));
        // Metrics must be untouched by a rejected optional op (spec.md §8 property 8).
        assert_eq!(d.metrics().snapshot().pushes, 0);
        assert_eq!(d.metrics().snapshot().errors, 0);
    }
}
