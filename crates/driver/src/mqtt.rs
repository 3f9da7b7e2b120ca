// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real MQTT-shaped driver for small clocks (spec.md §1: "32×8
//! MQTT-controlled clocks").
//!
//! spec.md §1 places "the MQTT wire client itself" out of scope as an
//! injectable transport. This driver expresses the abstract push/draw
//! contract over `async-nats` — the teacher's actual pub/sub dependency —
//! publishing a JSON frame to `<topic_base>/<host>/frame` exactly as an
//! MQTT client would publish to the same topic string (see DESIGN.md
//! Open Question OQ-1). Grounded in the teacher's `NatsPublisher`
//! (`crates/mux/src/transport/nats_pub.rs`).

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;

use crate::capability::{DisplayCapabilities, Point, Rgba, TextAlign};
use crate::driver::{Driver, HealthStatus, PushResult};
use crate::error::{DriverError, DriverResult};
use crate::metrics::DriverMetrics;

#[derive(Debug, Clone, Serialize)]
struct FramePayload {
    width: u16,
    height: u16,
    pixels: Vec<(Point, Rgba)>,
}

/// Real MQTT-shaped driver backed by a shared `async_nats::Client`.
///
/// The client is shared across all devices (spec.md §5: "The MQTT client
/// is shared across all devices"); only `topic_base` and `host` are
/// per-driver.
pub struct MqttDriver {
    client: async_nats::Client,
    topic_base: String,
    host: String,
    capabilities: DisplayCapabilities,
    metrics: Arc<DriverMetrics>,
    pixels: Mutex<Vec<(Point, Rgba)>>,
}

impl MqttDriver {
    pub fn new(
        client: async_nats::Client,
        topic_base: String,
        host: String,
        capabilities: DisplayCapabilities,
    ) -> Self {
        Self {
            client,
            topic_base,
            host,
            capabilities,
            metrics: Arc::new(DriverMetrics::new()),
            pixels: Mutex::new(Vec::new()),
        }
    }

    fn topic(&self, suffix: &str) -> String {
        format!("{}/{}/{}", self.topic_base, self.host, suffix)
    }

    fn now_ms() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

impl Driver for MqttDriver {
    fn initialize(&self) -> Pin<Box<dyn Future<Output = DriverResult<()>> + Send + '_>> {
        Box::pin(async move { Ok(()) })
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn shutdown(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {})
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = DriverResult<()>> + Send + '_>> {
        Box::pin(async move {
            #[allow(clippy::unwrap_used)]
            self.pixels.lock().unwrap_or_else(|p| p.into_inner()).clear();
            Ok(())
        })
    }

    fn push(&self) -> Pin<Box<dyn Future<Output = DriverResult<PushResult>> + Send + '_>> {
        Box::pin(async move {
            let t0 = Instant::now();
            let pixels = {
                #[allow(clippy::unwrap_used)]
                let mut buf = self.pixels.lock().unwrap_or_else(|p| p.into_inner());
                buf.clone()
            };
            let payload = FramePayload { width: self.capabilities.width, height: self.capabilities.height, pixels };
            let bytes = serde_json::to_vec(&payload).map_err(|e| DriverError::Transport(e.to_string()))?;
            self.client
                .publish(self.topic("frame"), bytes.into())
                .await
                .map_err(|e| {
                    self.metrics.record_error();
                    DriverError::Transport(e.to_string())
                })?;
            let frametime_ms = t0.elapsed().as_millis() as u64;
            self.metrics.record_push(frametime_ms, Self::now_ms());
            Ok(PushResult { frametime_ms })
        })
    }

    fn draw_pixel(&self, at: Point, color: Rgba) -> DriverResult<()> {
        #[allow(clippy::unwrap_used)]
        self.pixels.lock().unwrap_or_else(|p| p.into_inner()).push((at, color));
        Ok(())
    }

    fn draw_line(&self, from: Point, to: Point, color: Rgba) -> DriverResult<()> {
        // Bresenham-free approximation adequate for an 8-row clock strip;
        // drivers with a richer protocol may rasterize server-side instead.
        let (dx, dy) = (to.x - from.x, to.y - from.y);
        let steps = dx.abs().max(dy.abs()).max(1);
        for i in 0..=steps {
            let x = from.x + dx * i / steps;
            let y = from.y + dy * i / steps;
            self.draw_pixel(Point::new(x, y), color)?;
        }
        Ok(())
    }

    fn fill_rect(&self, top_left: Point, bottom_right: Point, color: Rgba) -> DriverResult<()> {
        for y in top_left.y..=bottom_right.y {
            for x in top_left.x..=bottom_right.x {
                self.draw_pixel(Point::new(x, y), color)?;
            }
        }
        Ok(())
    }

    fn draw_text(&self, _text: &str, _at: Point, _color: Rgba, _align: TextAlign) -> DriverResult<()> {
        if !self.capabilities.has_text_rendering {
            return Err(DriverError::NotSupported);
        }
        // Device-specific bitmap font rendering is an external collaborator
        // (spec.md §1); this driver relies on higher layers falling back to
        // `draw_pixel` when this returns `NotSupported`.
        Err(DriverError::NotSupported)
    }

    fn set_brightness(&self, level: u8) -> DriverResult<()> {
        if !self.capabilities.has_brightness_control {
            return Err(DriverError::NotSupported);
        }
        let client = self.client.clone();
        let topic = self.topic("brightness");
        tokio::spawn(async move {
            let payload = serde_json::json!({ "brightness": level });
            if let Ok(bytes) = serde_json::to_vec(&payload) {
                if let Err(e) = client.publish(topic, bytes.into()).await {
                    tracing::warn!(err = %e, "brightness publish failed");
                }
            }
        });
        Ok(())
    }

    fn set_display_power(&self, on: bool) -> DriverResult<()> {
        let client = self.client.clone();
        let topic = self.topic("power");
        tokio::spawn(async move {
            let payload = serde_json::json!({ "on": on });
            if let Ok(bytes) = serde_json::to_vec(&payload) {
                if let Err(e) = client.publish(topic, bytes.into()).await {
                    tracing::warn!(err = %e, "power publish failed");
                }
            }
        });
        Ok(())
    }

    fn play_tone(&self, _freq_hz: u32, _ms: u32) -> DriverResult<()> {
        Err(DriverError::NotSupported)
    }

    fn show_icon(&self, _id: &str) -> DriverResult<()> {
        Err(DriverError::NotSupported)
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + '_>> {
        Box::pin(async move {
            let t0 = Instant::now();
            match self.client.publish(self.topic("ping"), "".into()).await {
                Ok(()) => {
                    self.metrics.touch_seen(Self::now_ms());
                    HealthStatus { ok: true, latency_ms: t0.elapsed().as_millis() as u64, err: None }
                }
                Err(e) => {
                    HealthStatus { ok: false, latency_ms: t0.elapsed().as_millis() as u64, err: Some(e.to_string()) }
                }
            }
        })
    }

    fn capabilities(&self) -> DisplayCapabilities {
        self.capabilities
    }

    fn metrics(&self) -> Arc<DriverMetrics> {
        Arc::clone(&self.metrics)
    }
}
