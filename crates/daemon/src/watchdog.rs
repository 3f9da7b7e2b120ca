// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-device Watchdog (spec.md §4.7). Grounded in the teacher's
//! `spawn_health_checker` (`crates/mux/src/upstream/health.rs`): a small
//! interval-driven task per monitored target, whose actions are queued to
//! the owning actor rather than applied directly.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pixoo_driver::Driver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{WatchdogAction, WatchdogPolicy};
use crate::observability::ObservabilityPublisher;
use crate::registry::DeviceEntry;
use crate::scheduler::{Command, SchedulerHandle};
use crate::store::{Reachability, Store};

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Spawns the watchdog loop for one device; returns a token the caller
/// can cancel on shutdown.
pub fn spawn(
    host: String,
    policy: WatchdogPolicy,
    entry: Arc<DeviceEntry>,
    scheduler: SchedulerHandle,
    store: Arc<Store>,
    publisher: Arc<ObservabilityPublisher>,
) -> CancellationToken {
    let cancel = CancellationToken::new();
    if !policy.enabled {
        return cancel;
    }
    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        run(host, policy, entry, scheduler, store, publisher, task_cancel).await;
    });
    cancel
}

async fn run(
    host: String,
    policy: WatchdogPolicy,
    entry: Arc<DeviceEntry>,
    scheduler: SchedulerHandle,
    store: Arc<Store>,
    publisher: Arc<ObservabilityPublisher>,
    cancel: CancellationToken,
) {
    let interval = Duration::from_secs(policy.health_check_interval_seconds.max(1));
    let timeout = Duration::from_secs(policy.timeout_minutes.saturating_mul(60));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(host, "watchdog stopped");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        let display_on = store.device(&host).await.map(|d| d.display_on).unwrap_or(true);
        if !display_on && !policy.check_when_off {
            continue;
        }

        let driver = entry.driver().await;
        let status = driver.health_check().await;
        if status.ok {
            store
                .update_device(&host, |d| {
                    d.reachability = Reachability::Online;
                    d.last_error = None;
                })
                .await;
        } else {
            warn!(host, err = ?status.err, "watchdog health check failed");
            store
                .update_device(&host, |d| {
                    d.reachability = Reachability::Offline;
                    d.last_error = status.err.clone();
                })
                .await;
        }

        check_timeout(&host, &policy, &driver, &scheduler, &publisher, timeout).await;
    }
}

async fn check_timeout(
    host: &str,
    policy: &WatchdogPolicy,
    driver: &Arc<dyn Driver>,
    scheduler: &SchedulerHandle,
    publisher: &Arc<ObservabilityPublisher>,
    timeout: Duration,
) {
    let last_seen = driver.metrics().last_seen_ts_ms();
    if last_seen == 0 {
        // Never seen a successful push or health probe yet; nothing to
        // time out against.
        return;
    }
    let age_ms = now_ms().saturating_sub(last_seen);
    if Duration::from_millis(age_ms) <= timeout {
        return;
    }

    warn!(host, age_ms, "watchdog timeout exceeded, applying configured action");
    match policy.action {
        WatchdogAction::Restart => {
            let _ = scheduler.fire_and_forget(Command::Reset);
        }
        WatchdogAction::FallbackScene => {
            if let Some(scene) = policy.fallback_scene.clone() {
                let _ = scheduler.fire_and_forget(Command::Switch { scene, params: Default::default(), clear: true });
            } else {
                warn!(host, "fallback-scene action configured without a fallbackScene");
            }
        }
        WatchdogAction::MqttCommand => {
            // The Watchdog holds no transport handle of its own (spec.md
            // §4.7: "its actions are queued ... like any other command");
            // for this action the command targets the outbound MQTT/NATS
            // transport rather than the scheduler, so it is handed to the
            // Observability Publisher, whose NATS sink (`transport::nats`)
            // actually performs the publish.
            if let Some(sequence) = policy.mqtt_command_sequence.clone() {
                publisher.publish_mqtt_command(host, sequence).await;
            } else {
                warn!(host, "mqtt-command action configured without a mqttCommandSequence");
            }
        }
        WatchdogAction::Notify => {
            warn!(host, "watchdog notify: device unresponsive");
        }
    }
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
