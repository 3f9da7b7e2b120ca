// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NATS transport standing in for the spec's injectable MQTT broker
//! (spec.md §6): an inbound subscriber feeding [`CommandRouter::route_mqtt`]
//! and an outbound publisher for `<base>/<host>/scene/state` and
//! `<base>/<host>/ok` topics, fed by the [`ObservabilityPublisher`].
//!
//! Grounded in the teacher's `crates/mux/src/transport/nats_sub.rs` (subject
//! parsing, `tokio::select!` subscriber loop) and `nats_pub.rs` (connect
//! options, `broadcast::Receiver` consumption with `Lagged`/`Closed`
//! handling).
//!
//! NATS subjects are dot-delimited, but spec.md §6's topic tree uses `/`
//! and device hosts are dotted IPv4 addresses, so a literal `/`-for-`.`
//! swap would tokenize a host's own address. The host segment is escaped
//! (`.` -> `_`) only on the wire between this module and the broker; the
//! [`CommandRouter`] and [`ObservabilityPublisher`] never see NATS subjects,
//! only the original `/`-separated topic strings.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MqttConfig;
use crate::observability::{MetricsTick, MqttCommandRequest, ObservabilityPublisher, StateTransition};
use crate::router::Router as CommandRouter;

/// A connected NATS client plus the topic base it bridges for. Cheap to
/// clone — the subscriber and publisher loops each consume their own
/// instance by value.
#[derive(Clone)]
pub struct NatsTransport {
    client: async_nats::Client,
    topic_base: String,
}

impl NatsTransport {
    /// Connect to the configured broker. Retries the initial connect
    /// indefinitely, matching the teacher's `NatsPublisher::connect`.
    pub async fn connect(config: &MqttConfig) -> anyhow::Result<Self> {
        let mut opts = async_nats::ConnectOptions::new().retry_on_initial_connect();
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            opts = async_nats::ConnectOptions::with_user_and_password(user.clone(), pass.clone())
                .retry_on_initial_connect();
        }

        info!(url = %config.broker_url, topic_base = %config.topic_base, "connecting nats transport");
        let client = opts.connect(&config.broker_url).await?;
        info!("nats transport connected");

        Ok(Self { client, topic_base: config.topic_base.clone() })
    }

    /// A cheap clone of the underlying client, shared with `MqttDriver`
    /// instances (spec.md §5: "the MQTT client is shared across all
    /// devices").
    pub fn client(&self) -> async_nats::Client {
        self.client.clone()
    }

    pub fn topic_base(&self) -> &str {
        &self.topic_base
    }

    /// Run the inbound subscriber until `shutdown` fires, dispatching every
    /// message on the device topic tree to `router.route_mqtt`.
    pub async fn run_subscriber(self, router: Arc<CommandRouter>, shutdown: CancellationToken) -> anyhow::Result<()> {
        let wildcard = format!("{}.*.>", base_subject(&self.topic_base));
        let mut sub = self.client.subscribe(wildcard).await?;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                msg = sub.next() => {
                    let Some(msg) = msg else { break };
                    let Some(topic) = decode_topic(&self.topic_base, msg.subject.as_str()) else {
                        warn!(subject = %msg.subject, "nats transport: unrecognized subject");
                        continue;
                    };
                    router.route_mqtt(&topic, &msg.payload).await;
                }
            }
        }

        debug!("nats subscriber shutting down");
        Ok(())
    }

    /// Run the outbound publisher until `shutdown` fires, forwarding every
    /// state transition from `observability` to `<base>/<host>/scene/state`
    /// and every successful-push metrics tick to `<base>/<host>/ok`
    /// (spec.md §4.9: "on every successful push, publish a metrics tick").
    pub async fn run_publisher(self, observability: Arc<ObservabilityPublisher>, shutdown: CancellationToken) {
        let mut transitions = observability.subscribe_transitions();
        let mut metrics = observability.subscribe_metrics();
        let mut mqtt_commands = observability.subscribe_mqtt_commands();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = transitions.recv() => {
                    match event {
                        Ok(transition) => self.publish_transition(&transition).await,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            debug!("nats publisher lagged {n} transitions");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                event = metrics.recv() => {
                    match event {
                        Ok(tick) => self.publish_metrics(&tick).await,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            debug!("nats publisher lagged {n} metrics ticks");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                event = mqtt_commands.recv() => {
                    match event {
                        Ok(request) => self.publish_mqtt_command(&request).await,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            debug!("nats publisher lagged {n} mqtt-command requests");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        debug!("nats publisher shutting down");
    }

    async fn publish_transition(&self, transition: &StateTransition) {
        let Ok(json) = serde_json::to_vec(transition) else { return };
        let state_subject = encode_subject(&self.topic_base, &transition.host, "scene/state");
        if let Err(e) = self.client.publish(state_subject, json.into()).await {
            warn!(host = %transition.host, "nats publish scene/state failed: {e}");
        }
    }

    async fn publish_metrics(&self, tick: &MetricsTick) {
        let Ok(json) = serde_json::to_vec(tick) else { return };
        let ok_subject = encode_subject(&self.topic_base, &tick.host, "ok");
        if let Err(e) = self.client.publish(ok_subject, json.into()).await {
            warn!(host = %tick.host, "nats publish ok failed: {e}");
        }
    }

    /// Publish a Watchdog `mqtt-command` action's configured sequence, one
    /// payload at a time and in order, to `<base>/<host>/watchdog/command`.
    async fn publish_mqtt_command(&self, request: &MqttCommandRequest) {
        let subject = encode_subject(&self.topic_base, &request.host, "watchdog/command");
        for payload in &request.sequence {
            let Ok(json) = serde_json::to_vec(payload) else { continue };
            if let Err(e) = self.client.publish(subject.clone(), json.into()).await {
                warn!(host = %request.host, "nats publish watchdog/command failed: {e}");
                break;
            }
        }
    }
}

fn escape_host(host: &str) -> String {
    host.replace('.', "_")
}

fn unescape_host(token: &str) -> String {
    token.replace('_', ".")
}

fn base_subject(topic_base: &str) -> String {
    topic_base.trim_matches('/').replace('/', ".")
}

/// Build the NATS subject for `<topic_base>/<host>/<suffix>`.
fn encode_subject(topic_base: &str, host: &str, suffix: &str) -> String {
    format!("{}.{}.{}", base_subject(topic_base), escape_host(host), suffix.replace('/', "."))
}

/// Reverse [`encode_subject`], reconstructing the original `/`-separated
/// topic string that the [`CommandRouter`] expects.
fn decode_topic(topic_base: &str, subject: &str) -> Option<String> {
    let base = base_subject(topic_base);
    let rest = subject.strip_prefix(&base)?.strip_prefix('.')?;
    let (host_token, suffix_tokens) = rest.split_once('.')?;
    let host = unescape_host(host_token);
    let suffix = suffix_tokens.replace('.', "/");
    Some(format!("{}/{}/{}", topic_base.trim_end_matches('/'), host, suffix))
}

#[cfg(test)]
#[path = "nats_tests.rs"]
mod tests;
