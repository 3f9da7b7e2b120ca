// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real HTTP-JSON driver for panel-style displays (spec.md §1: "64×64
//! HTTP-controlled panels").
//!
//! Grounded in the teacher's `UpstreamClient`
//! (`crates/mux/src/upstream/client.rs`): a thin `reqwest::Client` wrapper
//! with a fixed request timeout and bearer auth, reused verbatim in shape.
//! Draw ops accumulate into an in-memory frame buffer; `push()` is the
//! only operation that talks to the network, matching the abstract
//! contract in spec.md §4.1.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Serialize;

use crate::capability::{DisplayCapabilities, Point, Rgba, TextAlign};
use crate::driver::{Driver, HealthStatus, PushResult};
use crate::error::{DriverError, DriverResult};
use crate::metrics::DriverMetrics;

/// One drawn primitive, serialized into the frame payload pushed to the panel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DrawOp {
    Pixel { at: Point, color: Rgba },
    Line { from: Point, to: Point, color: Rgba },
    Rect { top_left: Point, bottom_right: Point, color: Rgba },
    Text { text: String, at: Point, color: Rgba, align: TextAlign },
}

#[derive(Debug, Clone, Serialize)]
struct FramePayload {
    width: u16,
    height: u16,
    ops: Vec<DrawOp>,
}

/// Real HTTP-JSON driver. One instance per device; not shared.
pub struct HttpDriver {
    base_url: String,
    auth_token: Option<String>,
    client: Client,
    capabilities: DisplayCapabilities,
    metrics: Arc<DriverMetrics>,
    buffer: Mutex<Vec<DrawOp>>,
}

impl HttpDriver {
    pub fn new(base_url: String, auth_token: Option<String>, capabilities: DisplayCapabilities) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            base_url,
            auth_token,
            client,
            capabilities,
            metrics: Arc::new(DriverMetrics::new()),
            buffer: Mutex::new(Vec::new()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn push_op(&self, op: DrawOp) {
        #[allow(clippy::unwrap_used)]
        self.buffer.lock().unwrap_or_else(|p| p.into_inner()).push(op);
    }

    fn now_ms() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

impl Driver for HttpDriver {
    fn initialize(&self) -> Pin<Box<dyn Future<Output = DriverResult<()>> + Send + '_>> {
        Box::pin(async move {
            let req = self.client.get(self.url("/api/v1/health"));
            self.apply_auth(req)
                .send()
                .await
                .map_err(|e| DriverError::Transport(e.to_string()))?;
            Ok(())
        })
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
            self.buffer.lock().unwrap_or_else(|p| p.into_inner()).clear();
            Ok(())
        })
    }

    fn push(&self) -> Pin<Box<dyn Future<Output = DriverResult<PushResult>> + Send + '_>> {
        Box::pin(async move {
            let t0 = Instant::now();
            let ops = {
                #[allow(clippy::unwrap_used)]
                let mut buf = self.buffer.lock().unwrap_or_else(|p| p.into_inner());
                std::mem::take(&mut *buf)
            };
            let payload = FramePayload { width: self.capabilities.width, height: self.capabilities.height, ops };
            let req = self.client.post(self.url("/frame")).json(&payload);
            self.apply_auth(req)
                .send()
                .await
                .and_then(|r| r.error_for_status())
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
        self.push_op(DrawOp::Pixel { at, color });
        Ok(())
    }

    fn draw_line(&self, from: Point, to: Point, color: Rgba) -> DriverResult<()> {
        self.push_op(DrawOp::Line { from, to, color });
        Ok(())
    }

    fn fill_rect(&self, top_left: Point, bottom_right: Point, color: Rgba) -> DriverResult<()> {
        self.push_op(DrawOp::Rect { top_left, bottom_right, color });
        Ok(())
    }

    fn draw_text(&self, text: &str, at: Point, color: Rgba, align: TextAlign) -> DriverResult<()> {
        if !self.capabilities.has_text_rendering {
            return Err(DriverError::NotSupported);
        }
        self.push_op(DrawOp::Text { text: text.to_owned(), at, color, align });
        Ok(())
    }

    fn set_brightness(&self, level: u8) -> DriverResult<()> {
        if !self.capabilities.has_brightness_control {
            return Err(DriverError::NotSupported);
        }
        let client = self.client.clone();
        let url = self.url("/brightness");
        let token = self.auth_token.clone();
        tokio::spawn(async move {
            let mut req = client.post(url).json(&serde_json::json!({ "level": level }));
            if let Some(t) = token {
                req = req.bearer_auth(t);
            }
            if let Err(e) = req.send().await {
                tracing::warn!(err = %e, "brightness push failed");
            }
        });
        Ok(())
    }

    fn set_display_power(&self, on: bool) -> DriverResult<()> {
        let client = self.client.clone();
        let url = self.url("/power");
        let token = self.auth_token.clone();
        tokio::spawn(async move {
            let mut req = client.post(url).json(&serde_json::json!({ "on": on }));
            if let Some(t) = token {
                req = req.bearer_auth(t);
            }
            if let Err(e) = req.send().await {
                tracing::warn!(err = %e, "display power push failed");
            }
        });
        Ok(())
    }

    fn play_tone(&self, freq_hz: u32, ms: u32) -> DriverResult<()> {
        if !self.capabilities.has_audio {
            return Err(DriverError::NotSupported);
        }
        let client = self.client.clone();
        let url = self.url("/tone");
        let token = self.auth_token.clone();
        tokio::spawn(async move {
            let mut req = client.post(url).json(&serde_json::json!({ "freqHz": freq_hz, "ms": ms }));
            if let Some(t) = token {
                req = req.bearer_auth(t);
            }
            if let Err(e) = req.send().await {
                tracing::warn!(err = %e, "tone push failed");
            }
        });
        Ok(())
    }

    fn show_icon(&self, id: &str) -> DriverResult<()> {
        if !self.capabilities.has_icon_support {
            return Err(DriverError::NotSupported);
        }
        let client = self.client.clone();
        let url = self.url("/icon");
        let token = self.auth_token.clone();
        let id = id.to_owned();
        tokio::spawn(async move {
            let mut req = client.post(url).json(&serde_json::json!({ "id": id }));
            if let Some(t) = token {
                req = req.bearer_auth(t);
            }
            if let Err(e) = req.send().await {
                tracing::warn!(err = %e, "icon push failed");
            }
        });
        Ok(())
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + '_>> {
        Box::pin(async move {
            let t0 = Instant::now();
            let req = self.client.get(self.url("/api/v1/health"));
            match self.apply_auth(req).send().await {
                Ok(resp) if resp.status().is_success() => {
                    self.metrics.touch_seen(Self::now_ms());
                    HealthStatus { ok: true, latency_ms: t0.elapsed().as_millis() as u64, err: None }
                }
                Ok(resp) => HealthStatus {
                    ok: false,
                    latency_ms: t0.elapsed().as_millis() as u64,
                    err: Some(format!("status {}", resp.status())),
                },
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
