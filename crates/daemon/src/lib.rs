// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composition root (spec.md §4.10): wires components 1-9 into a running
//! daemon. Grounded in the teacher's `crates/mux/src/lib.rs::run()` —
//! parse config, build state, optionally wire the pub/sub transport,
//! spawn background tasks, build the axum router, serve with
//! `with_graceful_shutdown`.

pub mod config;
pub mod error;
pub mod observability;
pub mod registry;
pub mod router;
pub mod scene;
pub mod scheduler;
pub mod store;
pub mod transport;
pub mod watchdog;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use pixoo_driver::{ColorDepth, Driver, DisplayCapabilities, DriverKind, HttpDriver, MockDriver, MqttDriver};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{DeviceConfig, FleetConfig, FleetDocument};
use crate::observability::ObservabilityPublisher;
use crate::registry::DeviceRegistry;
use crate::router::Router as CommandRouter;
use crate::scene::SceneRegistry;
use crate::scheduler::{DriverFactory, Scheduler};
use crate::store::{GlobalState, Store};
use crate::transport::nats::NatsTransport;
use crate::transport::{build_router, AppState};

/// A startup failure, distinguished so `main` can pick the right exit
/// code (spec.md §5/§7: config errors abort before anything is bound;
/// a bind/serve failure is a fatal runtime error).
#[derive(Debug)]
pub enum StartupError {
    Config(anyhow::Error),
    Runtime(anyhow::Error),
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration error: {e:#}"),
            Self::Runtime(e) => write!(f, "fatal runtime error: {e:#}"),
        }
    }
}

impl std::error::Error for StartupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) | Self::Runtime(e) => e.source(),
        }
    }
}

/// Recognized `deviceType` values and the capability profile each implies
/// (spec.md §1's two worked examples). Any other value is a
/// `FatalConfigError` (spec.md §7): the daemon cannot construct a
/// `DisplayCapabilities` record for a type it does not know.
const KNOWN_DEVICE_TYPES: &[&str] = &["panel64", "clock32x8"];

fn capabilities_for(device_type: &str) -> DisplayCapabilities {
    match device_type {
        "clock32x8" => DisplayCapabilities {
            width: 32,
            height: 8,
            color_depth: ColorDepth::OneBit,
            has_audio: false,
            has_text_rendering: true,
            has_primitive_drawing: false,
            has_icon_support: false,
            has_brightness_control: true,
            min_brightness: 0,
            max_brightness: 100,
            max_fps: 5,
        },
        // "panel64" and anything else recognized later fall back to the
        // generic full-color panel profile.
        _ => DisplayCapabilities::default(),
    }
}

fn validate_document(document: &FleetDocument) -> anyhow::Result<()> {
    let mut seen_hosts = HashSet::new();
    for device in &document.devices {
        if !KNOWN_DEVICE_TYPES.contains(&device.device_type.as_str()) {
            anyhow::bail!("unknown deviceType '{}' for host '{}'", device.device_type, device.host);
        }
        if !seen_hosts.insert(device.host.as_str()) {
            anyhow::bail!("duplicate host '{}' in device list", device.host);
        }
        if let Some(scene) = &device.startup_scene {
            let caps = capabilities_for(&device.device_type);
            if scene == "clock" && !caps.has_text_rendering {
                anyhow::bail!("startup scene '{scene}' requires text rendering, which '{}' lacks", device.device_type);
            }
        }
    }
    Ok(())
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Builds a fresh driver instance for a given `(kind, deviceConfig)` pair,
/// used both for initial registration and `setDriver` hot-swap (spec.md
/// §4.2). `real` routes to the HTTP driver for panels and the MQTT-shaped
/// driver for clocks, since spec.md §1's two worked device families use
/// different wire transports; `mock` is always the in-memory driver.
fn build_driver_factory(
    auth_token: Option<String>,
    nats: Option<(async_nats::Client, String)>,
) -> DriverFactory {
    Arc::new(move |kind, config: &DeviceConfig| -> Arc<dyn Driver> {
        let caps = capabilities_for(&config.device_type);
        match kind {
            DriverKind::Mock => Arc::new(MockDriver::new(caps)),
            DriverKind::Real => match (&nats, config.device_type.as_str()) {
                (Some((client, topic_base)), "clock32x8") => {
                    Arc::new(MqttDriver::new(client.clone(), topic_base.clone(), config.host.clone(), caps))
                }
                _ => {
                    let base_url = format!("http://{}", config.host);
                    Arc::new(HttpDriver::new(base_url, auth_token.clone(), caps))
                }
            },
        }
    })
}

/// Run the fleet daemon until shutdown. Grounded in `crates/mux/src/lib.rs::run()`.
pub async fn run(config: FleetConfig) -> Result<(), StartupError> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let mut document = match &config.config_path {
        Some(path) => FleetDocument::load(path).map_err(StartupError::Config)?,
        None => FleetDocument::default(),
    };
    if let Some(devices) = config.device_override.clone() {
        document.devices = devices;
    }
    validate_document(&document).map_err(StartupError::Config)?;

    let persist_dir = config.state_dir.clone();
    let restored = Store::load_persisted(persist_dir.as_deref());
    let global = GlobalState {
        version: env!("CARGO_PKG_VERSION").to_owned(),
        started_at_ms: now_ms(),
        device_count: document.devices.len(),
    };
    let store = Store::new(global, persist_dir, config.persist_debounce());

    let registry = DeviceRegistry::new();
    let scenes = SceneRegistry::with_builtins().await;
    let publisher = ObservabilityPublisher::new();
    let topic_base = document.mqtt.as_ref().map(|m| m.topic_base.clone()).unwrap_or_else(|| "/home/pixoo".to_owned());
    let command_router = CommandRouter::new(topic_base.clone());

    // Signal handler (spec.md §5 "Graceful shutdown. On signal: stop
    // accepting new commands..."): first SIGTERM/SIGINT requests a
    // cooperative drain, a second forces immediate exit. Grounded in the
    // teacher's `crates/cli/src/run.rs` signal-handling block.
    {
        let sd = shutdown.clone();
        tokio::spawn(async move {
            let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
            let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

            tokio::select! {
                _ = async { if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await } } => {
                    info!("received sigterm");
                }
                _ = async { if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await } } => {
                    info!("received sigint");
                }
            }
            sd.cancel();

            tokio::select! {
                _ = async { if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await } } => {
                    info!("received second signal, forcing exit");
                }
                _ = async { if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await } } => {
                    info!("received second signal, forcing exit");
                }
            }
            std::process::exit(130);
        });
    }

    let nats_transport = match &document.mqtt {
        Some(mqtt) => match NatsTransport::connect(mqtt).await {
            Ok(transport) => Some(transport),
            Err(err) => {
                warn!(%err, "failed to connect mqtt/nats transport, continuing without it");
                None
            }
        },
        None => None,
    };

    let driver_factory =
        build_driver_factory(config.auth_token.clone(), nats_transport.as_ref().map(|t| (t.client(), t.topic_base().to_owned())));

    let default_driver_kind = config.default_driver_kind();
    let mut watchdog_tokens = Vec::new();
    let mut device_handles = Vec::new();

    for device in document.devices.clone() {
        let kind = device.driver.unwrap_or(default_driver_kind);
        let driver = driver_factory(kind, &device);
        if let Err(err) = driver.initialize().await {
            warn!(host = %device.host, %err, "driver failed to initialize at startup; device registered idle");
        }
        let entry = registry.register(device.clone(), driver).await;

        store.insert_device(&device.host, crate::store::DeviceRuntimeState::new(
            &device.host,
            &device.device_type,
            device.display_name.clone().unwrap_or_else(|| device.host.clone()),
        )).await;
        if let Some(brightness) = device.brightness {
            store.update_device(&device.host, |d| d.brightness = brightness).await;
        }

        // Rehydrate this device's persisted subset before deciding what
        // to activate (spec.md §4.3 "on startup, restore"): a persisted
        // active scene takes priority over `startupScene`.
        let persisted_scene = restored
            .as_ref()
            .and_then(|snap| snap.devices.get(&device.host))
            .and_then(|fields| fields.active_scene.clone());
        if let Some(snapshot) = &restored {
            if snapshot.devices.contains_key(&device.host) {
                let mut single = snapshot.clone();
                single.devices.retain(|host, _| host == &device.host);
                store.restore(single).await;
            }
        }

        let handle = Scheduler::spawn(
            device.clone(),
            Arc::clone(&entry),
            Arc::clone(&scenes),
            Arc::clone(&store),
            Arc::clone(&publisher),
            Arc::clone(&driver_factory),
        );
        command_router.bind(&device.host, handle.clone()).await;
        device_handles.push(handle.clone());

        if let Some(policy) = device.watchdog.clone() {
            let token = watchdog::spawn(
                device.host.clone(),
                policy,
                Arc::clone(&entry),
                handle.clone(),
                Arc::clone(&store),
                Arc::clone(&publisher),
            );
            watchdog_tokens.push(token);
        }

        let scene_to_activate = persisted_scene.or_else(|| device.startup_scene.clone());
        if let Some(scene) = scene_to_activate {
            if let Err(err) = handle.switch(scene, Default::default(), true).await {
                warn!(host = %device.host, %err, "startup scene failed to start");
            }
        }
    }

    let mut transport_tasks = Vec::new();
    if let Some(transport) = nats_transport {
        let sub_shutdown = shutdown.clone();
        let sub_router = Arc::clone(&command_router);
        let subscriber = transport.clone();
        transport_tasks.push(tokio::spawn(async move {
            if let Err(err) = subscriber.run_subscriber(sub_router, sub_shutdown).await {
                error!(%err, "nats subscriber exited with error");
            }
        }));

        let pub_shutdown = shutdown.clone();
        let pub_observability = Arc::clone(&publisher);
        transport_tasks.push(tokio::spawn(async move {
            transport.run_publisher(pub_observability, pub_shutdown).await;
        }));
    }

    let app_state = AppState {
        store: Arc::clone(&store),
        registry: Arc::clone(&registry),
        scenes: Arc::clone(&scenes),
        router: Arc::clone(&command_router),
        observability: Arc::clone(&publisher),
        auth_token: config.auth_token.clone(),
    };
    let router = build_router(app_state);

    info!(%addr, devices = document.devices.len(), "pixoo-fleetd listening");
    let listener = TcpListener::bind(&addr).await.map_err(|e| StartupError::Runtime(e.into()))?;

    let serve_shutdown = shutdown.clone();
    let serve_result = axum::serve(listener, router)
        .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
        .await;

    // Forced-exit budget (spec.md §5): cooperative shutdown races a hard
    // deadline so a stuck device task never wedges the process.
    let shutdown_timeout = config.shutdown_timeout();
    tokio::select! {
        () = async {
            for token in &watchdog_tokens { token.cancel(); }
            for handle in &device_handles {
                let _ = handle.shutdown().await;
            }
            for task in transport_tasks { let _ = task.await; }
            store.flush_persistence().await;
        } => {}
        () = tokio::time::sleep(shutdown_timeout) => {
            error!("shutdown budget exceeded, forcing exit");
            std::process::exit(2);
        }
    }

    serve_result.map_err(|e| StartupError::Runtime(e.into()))?;
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
