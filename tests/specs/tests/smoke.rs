// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `pixoo-fleetd` binary and
//! exercise it over HTTP and WebSocket with mock-driven devices.

use std::time::Duration;

use futures_util::StreamExt;
use pixoo_specs::{FixtureDevice, FleetdProcess};
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn http_status_reports_device_count() -> anyhow::Result<()> {
    let fleetd = FleetdProcess::start(&[
        FixtureDevice::new("10.0.0.1", "panel64"),
        FixtureDevice::new("10.0.0.2", "clock32x8"),
    ])?;
    fleetd.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value = reqwest::get(format!("{}/api/status", fleetd.base_url())).await?.json().await?;
    assert_eq!(resp["status"], "running");
    assert_eq!(resp["deviceCount"], 2);

    Ok(())
}

#[tokio::test]
async fn http_lists_registered_devices() -> anyhow::Result<()> {
    let fleetd = FleetdProcess::start(&[FixtureDevice::new("10.0.0.1", "panel64")])?;
    fleetd.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value = reqwest::get(format!("{}/api/devices", fleetd.base_url())).await?.json().await?;
    let devices = resp.as_array().expect("devices array");
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0]["host"], "10.0.0.1");

    Ok(())
}

#[tokio::test]
async fn http_switch_scene_advances_generation() -> anyhow::Result<()> {
    let fleetd = FleetdProcess::start(&[FixtureDevice::new("10.0.0.1", "panel64")])?;
    fleetd.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let before: serde_json::Value =
        reqwest::get(format!("{}/api/devices/10.0.0.1", fleetd.base_url())).await?.json().await?;
    let gen_before = before["generationId"].as_u64().unwrap_or(0);

    let switch = client
        .post(format!("{}/api/devices/10.0.0.1/scene", fleetd.base_url()))
        .json(&serde_json::json!({ "scene": "static_text", "clear": true, "text": "hi" }))
        .send()
        .await?;
    assert!(switch.status().is_success());

    let after: serde_json::Value =
        reqwest::get(format!("{}/api/devices/10.0.0.1", fleetd.base_url())).await?.json().await?;
    let gen_after = after["generationId"].as_u64().unwrap_or(0);
    assert!(gen_after > gen_before, "generation should have advanced after a switch");
    assert_eq!(after["activeScene"], "static_text");

    Ok(())
}

#[tokio::test]
async fn http_switch_unknown_device_is_not_found() -> anyhow::Result<()> {
    let fleetd = FleetdProcess::start(&[FixtureDevice::new("10.0.0.1", "panel64")])?;
    fleetd.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/devices/10.0.0.99/scene", fleetd.base_url()))
        .json(&serde_json::json!({ "scene": "static_text" }))
        .send()
        .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn http_two_devices_are_independent() -> anyhow::Result<()> {
    let fleetd = FleetdProcess::start(&[
        FixtureDevice::new("10.0.0.1", "panel64"),
        FixtureDevice::new("10.0.0.2", "panel64"),
    ])?;
    fleetd.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    client
        .post(format!("{}/api/devices/10.0.0.1/scene", fleetd.base_url()))
        .json(&serde_json::json!({ "scene": "clock" }))
        .send()
        .await?;

    let d2: serde_json::Value =
        reqwest::get(format!("{}/api/devices/10.0.0.2", fleetd.base_url())).await?.json().await?;
    assert_eq!(d2["activeScene"], serde_json::Value::Null);

    Ok(())
}

#[tokio::test]
async fn ws_receives_init_then_scene_switch() -> anyhow::Result<()> {
    let fleetd = FleetdProcess::start(&[FixtureDevice::new("10.0.0.1", "panel64")])?;
    fleetd.wait_healthy(TIMEOUT).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(fleetd.ws_url()).await?;

    let first = tokio::time::timeout(TIMEOUT, ws.next()).await?.expect("stream closed")?;
    let Message::Text(text) = first else { anyhow::bail!("expected text frame") };
    let init: serde_json::Value = serde_json::from_str(&text)?;
    assert_eq!(init["type"], "init");

    let client = reqwest::Client::new();
    client
        .post(format!("{}/api/devices/10.0.0.1/scene", fleetd.base_url()))
        .json(&serde_json::json!({ "scene": "static_text" }))
        .send()
        .await?;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("never observed scene_switch over websocket");
        }
        let Some(msg) = tokio::time::timeout(TIMEOUT, ws.next()).await?.transpose()? else {
            anyhow::bail!("stream closed before scene_switch");
        };
        let Message::Text(text) = msg else { continue };
        let value: serde_json::Value = serde_json::from_str(&text)?;
        if value["type"] == "scene_switch" && value["host"] == "10.0.0.1" {
            assert_eq!(value["scene"], "static_text");
            break;
        }
    }

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn graceful_shutdown_exits_cleanly() -> anyhow::Result<()> {
    let mut fleetd = FleetdProcess::start(&[FixtureDevice::new("10.0.0.1", "panel64")])?;
    fleetd.wait_healthy(TIMEOUT).await?;

    fleetd.shutdown(TIMEOUT).await?;

    Ok(())
}
