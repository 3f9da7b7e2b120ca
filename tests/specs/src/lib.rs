// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `pixoo-fleetd` binary as a subprocess, with a
//! generated device document full of `mock` drivers, and exercises it
//! over HTTP and WebSocket.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Once;
use std::time::Duration;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls. Safe to call
/// multiple times — only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Resolve the path to the compiled `pixoo-fleetd` binary.
pub fn fleetd_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs -> tests -> workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("pixoo-fleetd")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// One device entry in a generated fixture document, all `mock`-driven
/// so the suite never depends on real hardware.
pub struct FixtureDevice {
    pub host: String,
    pub device_type: String,
    pub startup_scene: Option<String>,
}

impl FixtureDevice {
    pub fn new(host: &str, device_type: &str) -> Self {
        Self { host: host.to_owned(), device_type: device_type.to_owned(), startup_scene: None }
    }

    pub fn with_startup_scene(mut self, scene: &str) -> Self {
        self.startup_scene = Some(scene.to_owned());
        self
    }
}

/// A running `pixoo-fleetd` process that is killed on drop.
pub struct FleetdProcess {
    child: Child,
    port: u16,
    _config_dir: tempfile::TempDir,
}

impl FleetdProcess {
    /// Spawn with a generated config document containing `devices`, all
    /// using the `mock` driver.
    pub fn start(devices: &[FixtureDevice]) -> anyhow::Result<Self> {
        ensure_crypto();
        let binary = fleetd_binary();
        anyhow::ensure!(binary.exists(), "pixoo-fleetd binary not found at {}", binary.display());

        let port = free_port()?;
        let config_dir = tempfile::tempdir()?;
        let config_path = config_dir.path().join("fleet.json");

        let device_docs: Vec<serde_json::Value> = devices
            .iter()
            .map(|d| {
                let mut doc = serde_json::json!({
                    "host": d.host,
                    "deviceType": d.device_type,
                    "driver": "mock",
                });
                if let Some(scene) = &d.startup_scene {
                    doc["startupScene"] = serde_json::Value::String(scene.clone());
                }
                doc
            })
            .collect();

        std::fs::write(
            &config_path,
            serde_json::to_vec_pretty(&serde_json::json!({ "devices": device_docs }))?,
        )?;

        let child = Command::new(&binary)
            .arg("--host")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(port.to_string())
            .arg("--config-path")
            .arg(&config_path)
            .arg("--log-level")
            .arg("warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { child, port, _config_dir: config_dir })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }

    /// Poll `/api/status` until it responds with 200.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let client = reqwest::Client::new();
        let url = format!("{}/api/status", self.base_url());
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("pixoo-fleetd did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Send SIGTERM for a graceful shutdown and wait for exit.
    #[cfg(unix)]
    pub async fn shutdown(&mut self, timeout: Duration) -> anyhow::Result<()> {
        let pid = self.child.id().to_string();
        let status = Command::new("kill").arg("-TERM").arg(&pid).status()?;
        anyhow::ensure!(status.success(), "kill -TERM {pid} failed");
        self.wait_exit(timeout).await
    }

    pub async fn wait_exit(&mut self, timeout: Duration) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            if tokio::time::Instant::now() > deadline {
                let _ = self.child.kill();
                anyhow::bail!("process did not exit within {timeout:?}");
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

impl Drop for FleetdProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
