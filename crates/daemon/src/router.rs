// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command Router (spec.md §4.6): turns transport-specific payloads into
//! typed [`scheduler::Command`]s, resolves the target device via the
//! [`DeviceRegistry`], and hands off to its mailbox.
//!
//! The router is stateless aside from subscription bookkeeping — it never
//! touches driver or scene APIs directly (spec.md §4.6 invariant).
//! Grounded in the teacher's subject parsing in
//! `crates/mux/src/transport/nats_sub.rs`.

use std::collections::HashMap;
use std::sync::Arc;

use pixoo_driver::DriverKind;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::FleetError;
use crate::scheduler::{Command, SchedulerHandle};

/// One registered device's mailbox, keyed by host, plus the router's own
/// bookkeeping of which topic suffixes it understands.
pub struct Router {
    handles: RwLock<HashMap<String, SchedulerHandle>>,
    topic_base: String,
}

#[derive(Debug, Deserialize)]
struct ScenePayload {
    scene: String,
    #[serde(default)]
    clear: bool,
    #[serde(flatten)]
    params: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct DriverPayload {
    driver: DriverKind,
}

#[derive(Debug, Deserialize)]
struct PowerPayload {
    on: bool,
}

#[derive(Debug, Deserialize)]
struct BrightnessPayload {
    brightness: u8,
}

/// A topic parsed into its device host and command suffix (spec.md §6).
#[derive(Debug, PartialEq, Eq)]
pub enum ParsedTopic<'a> {
    Device { host: &'a str, suffix: &'a str },
    StateUpdate,
}

impl Router {
    pub fn new(topic_base: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { handles: RwLock::new(HashMap::new()), topic_base: topic_base.into() })
    }

    pub async fn bind(&self, host: &str, handle: SchedulerHandle) {
        self.handles.write().await.insert(host.to_owned(), handle);
    }

    async fn handle_for(&self, host: &str) -> Result<SchedulerHandle, FleetError> {
        self.handles.read().await.get(host).cloned().ok_or(FleetError::DeviceNotFound)
    }

    /// Split `<base>/<host>/<suffix...>` into a host and remaining suffix.
    /// `<base>/state/update` is recognized as the one non-per-device
    /// topic in the tree.
    pub fn parse_topic<'a>(&self, topic: &'a str) -> Option<ParsedTopic<'a>> {
        let rest = topic.strip_prefix(&self.topic_base)?.trim_start_matches('/');
        if rest == "state/update" {
            return Some(ParsedTopic::StateUpdate);
        }
        let (host, suffix) = rest.split_once('/')?;
        Some(ParsedTopic::Device { host, suffix })
    }

    /// Route one MQTT message. Invalid topics are dropped with a warning;
    /// an unknown device logs a warning rather than erroring (spec.md
    /// §4.6: MQTT failures never become HTTP-style error responses).
    pub async fn route_mqtt(&self, topic: &str, payload: &[u8]) {
        let Some(parsed) = self.parse_topic(topic) else {
            warn!(topic, "dropping message on unrecognized topic");
            return;
        };
        let ParsedTopic::Device { host, suffix } = parsed else {
            // `state/update` patches arbitrary scene state directly; out
            // of scope for the command router's typed commands.
            return;
        };
        let Ok(handle) = self.handle_for(host).await else {
            warn!(host, "mqtt command for unknown device");
            return;
        };
        let command = match suffix {
            "scene/switch" => Self::parse_scene_switch(payload),
            "scene/pause" => Ok(Command::Pause),
            "scene/resume" => Ok(Command::Resume),
            "scene/stop" => Ok(Command::Stop),
            "scene/restart" => Ok(Command::Restart),
            "driver/switch" => Self::parse_driver_switch(payload),
            "device/reset" => Ok(Command::Reset),
            "display/power" => Self::parse_power(payload),
            "display/brightness" => Self::parse_brightness(payload),
            other => {
                warn!(host, suffix = other, "unrecognized device topic suffix");
                return;
            }
        };
        match command {
            Ok(command) => {
                if handle.fire_and_forget(command).is_err() {
                    warn!(host, "device mailbox full or closed, dropping mqtt command");
                }
            }
            Err(err) => warn!(host, ?err, "invalid mqtt command payload"),
        }
    }

    fn parse_scene_switch(payload: &[u8]) -> Result<Command, FleetError> {
        let parsed: ScenePayload =
            serde_json::from_slice(payload).map_err(|_| FleetError::ValidationError)?;
        Ok(Command::Switch { scene: parsed.scene, params: parsed.params, clear: parsed.clear })
    }

    fn parse_driver_switch(payload: &[u8]) -> Result<Command, FleetError> {
        let parsed: DriverPayload =
            serde_json::from_slice(payload).map_err(|_| FleetError::ValidationError)?;
        Ok(Command::SetDriver(parsed.driver))
    }

    fn parse_power(payload: &[u8]) -> Result<Command, FleetError> {
        let parsed: PowerPayload =
            serde_json::from_slice(payload).map_err(|_| FleetError::ValidationError)?;
        Ok(Command::SetPower(parsed.on))
    }

    fn parse_brightness(payload: &[u8]) -> Result<Command, FleetError> {
        let parsed: BrightnessPayload =
            serde_json::from_slice(payload).map_err(|_| FleetError::ValidationError)?;
        if parsed.brightness > 100 {
            return Err(FleetError::ValidationError);
        }
        Ok(Command::SetBrightness(parsed.brightness))
    }

    // -- HTTP entry points (spec.md §6 HTTP/REST surface) --------------------
    //
    // Unlike MQTT, HTTP callers wait for and surface the outcome, so these
    // go through `SchedulerHandle`'s `await`-and-reply methods rather than
    // `fire_and_forget`.

    pub async fn http_switch(&self, host: &str, scene: String, params: Map<String, Value>, clear: bool) -> Result<(), FleetError> {
        self.handle_for(host).await?.switch(scene, params, clear).await
    }

    pub async fn http_pause(&self, host: &str) -> Result<(), FleetError> {
        self.handle_for(host).await?.pause().await
    }

    pub async fn http_resume(&self, host: &str) -> Result<(), FleetError> {
        self.handle_for(host).await?.resume().await
    }

    pub async fn http_stop(&self, host: &str) -> Result<(), FleetError> {
        self.handle_for(host).await?.stop().await
    }

    pub async fn http_restart(&self, host: &str) -> Result<(), FleetError> {
        self.handle_for(host).await?.restart().await
    }

    pub async fn http_set_driver(&self, host: &str, kind: DriverKind) -> Result<(), FleetError> {
        self.handle_for(host).await?.set_driver(kind).await
    }

    pub async fn http_set_power(&self, host: &str, on: bool) -> Result<(), FleetError> {
        self.handle_for(host).await?.set_power(on).await
    }

    pub async fn http_set_brightness(&self, host: &str, level: u8) -> Result<(), FleetError> {
        if level > 100 {
            return Err(FleetError::ValidationError);
        }
        self.handle_for(host).await?.set_brightness(level).await
    }

    pub async fn http_reset(&self, host: &str) -> Result<(), FleetError> {
        self.handle_for(host).await?.reset().await
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
