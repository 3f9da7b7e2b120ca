// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: CLI/env flags (grounded in the teacher's
//! `MuxConfig`, `crates/mux/src/config.rs`) plus the JSON/YAML device
//! document described in spec.md §6.

use std::path::PathBuf;

use pixoo_driver::DriverKind;
use serde::{Deserialize, Serialize};

/// CLI/env configuration for the fleet daemon binary.
#[derive(Debug, Clone, clap::Args)]
pub struct FleetConfig {
    /// Host to bind the HTTP/WS control plane on.
    #[arg(long, default_value = "127.0.0.1", env = "PIXOO_FLEETD_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 10829, env = "PIXOO_FLEETD_PORT")]
    pub port: u16,

    /// Path to the device/mqtt/webui document (JSON or YAML).
    #[arg(long, env = "PIXOO_FLEETD_CONFIG")]
    pub config_path: Option<PathBuf>,

    /// Bearer token for the HTTP control plane. If unset, auth is disabled.
    #[arg(long, env = "PIXOO_FLEETD_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Default driver kind for devices that don't specify one.
    #[arg(long, default_value = "mock", env = "PIXOO_FLEETD_DEFAULT_DRIVER")]
    pub default_driver: String,

    /// Directory for the debounced State Store JSON snapshot.
    #[arg(long, env = "PIXOO_FLEETD_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Persistence debounce interval in milliseconds (`T_persist`, spec.md §4.3).
    #[arg(long, default_value_t = 10_000, env = "PIXOO_FLEETD_PERSIST_DEBOUNCE_MS")]
    pub persist_debounce_ms: u64,

    /// Graceful shutdown budget before forced exit (spec.md §5).
    #[arg(long, default_value_t = 5_000, env = "PIXOO_FLEETD_SHUTDOWN_TIMEOUT_MS")]
    pub shutdown_timeout_ms: u64,

    /// Overrides the device list from the config document — for tests
    /// (mirrors the teacher's test-only override knobs).
    #[arg(skip)]
    pub device_override: Option<Vec<DeviceConfig>>,

    /// Log level (`error`, `warn`, `info`, `debug`, `trace`).
    #[arg(long, default_value = "info", env = "PIXOO_FLEETD_LOG_LEVEL")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value = "text", env = "PIXOO_FLEETD_LOG_FORMAT")]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl FleetConfig {
    pub fn persist_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.persist_debounce_ms)
    }

    pub fn shutdown_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn default_driver_kind(&self) -> DriverKind {
        match self.default_driver.as_str() {
            "real" => DriverKind::Real,
            _ => DriverKind::Mock,
        }
    }
}

/// The `{ devices, mqtt, webui }` document described in spec.md §6.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetDocument {
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
    #[serde(default)]
    pub webui: Option<WebUiConfig>,
}

impl FleetDocument {
    /// Load from a JSON or YAML file, dispatching on extension — both
    /// formats are carried per SPEC_FULL.md §1 ("JSON/YAML" config doc).
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        );
        if is_yaml {
            Ok(serde_yml::from_str(&contents)?)
        } else {
            Ok(serde_json::from_str(&contents)?)
        }
    }
}

/// One configured device (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    pub host: String,
    pub device_type: String,
    #[serde(default)]
    pub driver: Option<DriverKind>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub startup_scene: Option<String>,
    #[serde(default)]
    pub brightness: Option<u8>,
    #[serde(default)]
    pub watchdog: Option<WatchdogPolicy>,
    /// Scenes with a `schedule` window that should auto-activate/deactivate
    /// on this device without an explicit `switch` command (spec.md §4.5
    /// "Schedule gating"). Evaluated once per minute by the scheduler.
    #[serde(default)]
    pub scheduled_scenes: Vec<String>,
}

/// Per-device watchdog policy (spec.md §4.7, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogPolicy {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_health_interval")]
    pub health_check_interval_seconds: u64,
    #[serde(default)]
    pub check_when_off: bool,
    pub timeout_minutes: u64,
    pub action: WatchdogAction,
    #[serde(default)]
    pub fallback_scene: Option<String>,
    #[serde(default)]
    pub mqtt_command_sequence: Option<Vec<serde_json::Value>>,
}

fn default_true() -> bool {
    true
}

fn default_health_interval() -> u64 {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatchdogAction {
    Restart,
    FallbackScene,
    MqttCommand,
    Notify,
}

/// MQTT/pub-sub broker settings (spec.md §6). `brokerUrl` is consumed by
/// the `async-nats` transport standing in for the injectable MQTT client
/// (see DESIGN.md OQ-1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttConfig {
    pub broker_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_topic_base")]
    pub topic_base: String,
}

fn default_topic_base() -> String {
    "/home/pixoo".to_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebUiConfig {
    #[serde(default = "default_webui_port")]
    pub port: u16,
    #[serde(default)]
    pub auth: Option<String>,
}

fn default_webui_port() -> u16 {
    10829
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
