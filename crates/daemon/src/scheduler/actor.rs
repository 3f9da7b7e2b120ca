// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-device scheduler actor (spec.md §4.5, "the heart"). One task
//! per device; `run()` is the pseudocontract render loop made concrete.
//!
//! Suspension-point discipline mirrors the teacher's `cli/session/run.rs`
//! `tokio::select!` loop: a `render` in flight is never raced against the
//! mailbox (it cannot be interrupted), but the sleep between ticks always
//! is, so a command is actioned the instant it arrives rather than
//! waiting out a stale timer.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{Datelike, Local, Timelike};
use pixoo_driver::{Driver, DriverKind};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::command::{Command, Envelope};
use super::handle::SchedulerHandle;
use crate::config::DeviceConfig;
use crate::error::FleetError;
use crate::observability::{ObservabilityPublisher, StateTransition};
use crate::registry::DeviceEntry;
use crate::scene::{SceneContext, SceneRegistry};
use crate::store::{PlayState, RunStatus, Store};

/// Consecutive-failure fallback policy (spec.md §4.5 "failure semantics",
/// explicit Open Question — resolved in DESIGN.md OQ-3: `K=5` within
/// `W=60s`, device-local, no cross-device coupling).
const FAILURE_THRESHOLD: u32 = 5;
const FAILURE_WINDOW: Duration = Duration::from_secs(60);

/// Safety cap on inter-frame delay regardless of what a scene requests
/// (spec.md §4.5 `MAX_DELAY_MS`).
const MAX_DELAY_MS: u64 = 60_000;

const INIT_CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

/// How often `scheduledScenes` windows are re-evaluated (spec.md §4.5
/// "Schedule gating"). Finer than minute-of-day resolution would buy
/// nothing; coarser would make activation lag the window's start visibly.
const SCHEDULE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Constructs a driver instance for a given kind — the same factory used
/// at startup registration, re-invoked on hot-swap.
pub type DriverFactory = Arc<dyn Fn(DriverKind, &DeviceConfig) -> Arc<dyn Driver> + Send + Sync>;

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

pub struct Scheduler {
    host: String,
    entry: Arc<DeviceEntry>,
    scenes: Arc<SceneRegistry>,
    store: Arc<Store>,
    publisher: Arc<ObservabilityPublisher>,
    driver_factory: DriverFactory,
    mailbox: mpsc::Receiver<Envelope>,

    generation: u64,
    active_scene: Option<String>,
    active_params: Map<String, Value>,
    last_switch: Instant,
    failure_times: VecDeque<Instant>,
    next_delay_ms: u64,
}

impl Scheduler {
    pub fn spawn(
        config: DeviceConfig,
        entry: Arc<DeviceEntry>,
        scenes: Arc<SceneRegistry>,
        store: Arc<Store>,
        publisher: Arc<ObservabilityPublisher>,
        driver_factory: DriverFactory,
    ) -> SchedulerHandle {
        let (handle, mailbox) = SchedulerHandle::new();
        let scheduler = Self {
            host: config.host.clone(),
            entry,
            scenes,
            store,
            publisher,
            driver_factory,
            mailbox,
            generation: 0,
            active_scene: None,
            active_params: Map::new(),
            last_switch: Instant::now(),
            failure_times: VecDeque::new(),
            next_delay_ms: 0,
        };
        tokio::spawn(scheduler.run());
        handle
    }

    async fn run(mut self) {
        let mut schedule_timer = tokio::time::interval(SCHEDULE_CHECK_INTERVAL);
        schedule_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let playing = self
                .store
                .device(&self.host)
                .await
                .map(|d| d.play_state == PlayState::Playing && d.active_scene.is_some())
                .unwrap_or(false);

            if playing {
                tokio::select! {
                    maybe_env = self.mailbox.recv() => {
                        match maybe_env {
                            Some(env) => if self.dispatch(env).await { break; },
                            None => break,
                        }
                    }
                    _ = tokio::time::sleep(Duration::from_millis(self.next_delay_ms)) => {
                        self.tick().await;
                    }
                    _ = schedule_timer.tick() => {
                        self.evaluate_schedule().await;
                    }
                }
            } else {
                tokio::select! {
                    maybe_env = self.mailbox.recv() => {
                        match maybe_env {
                            Some(env) => if self.dispatch(env).await { break; },
                            None => break,
                        }
                    }
                    _ = schedule_timer.tick() => {
                        self.evaluate_schedule().await;
                    }
                }
            }
        }
        debug!(host = %self.host, "scheduler actor exiting");
    }

    /// Auto-activates/deactivates `scheduledScenes` windows (spec.md §4.5
    /// "Schedule gating"). Local-time evaluation — DESIGN.md OQ-4.
    async fn evaluate_schedule(&mut self) {
        if self.entry.config.scheduled_scenes.is_empty() {
            return;
        }

        let now = Local::now();
        let weekday = now.weekday().num_days_from_monday() as u8;
        let minute_of_day = (now.hour() * 60 + now.minute()) as u16;

        let mut due_scene = None;
        for name in &self.entry.config.scheduled_scenes {
            let Ok(scene) = self.scenes.get(name).await else { continue };
            let Some(window) = scene.metadata().schedule else { continue };
            if window.contains(weekday, minute_of_day) {
                due_scene = Some(name.clone());
                break;
            }
        }

        match (&due_scene, &self.active_scene) {
            (Some(due), Some(active)) if due == active => {}
            (Some(due), _) => {
                let due = due.clone();
                if let Err(err) = self.switch(due.clone(), Map::new(), true).await {
                    warn!(host = %self.host, scene = %due, %err, "scheduled scene activation failed");
                }
            }
            (None, Some(active)) if self.entry.config.scheduled_scenes.iter().any(|s| s == active) => {
                if let Err(err) = self.stop().await {
                    warn!(host = %self.host, %err, "scheduled scene deactivation failed");
                }
            }
            _ => {}
        }
    }

    /// Returns `true` when the actor should stop running (post-`Shutdown`).
    async fn dispatch(&mut self, env: Envelope) -> bool {
        let Envelope { command, reply } = env;
        let stop = matches!(command, Command::Shutdown);
        let result = self.handle_command(command).await;
        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
        stop
    }

    async fn handle_command(&mut self, command: Command) -> Result<(), FleetError> {
        match command {
            Command::Switch { scene, params, clear } => self.switch(scene, params, clear).await,
            Command::Pause => self.pause().await,
            Command::Resume => self.resume().await,
            Command::Stop => self.stop().await,
            Command::Restart => {
                let scene = self.active_scene.clone().ok_or(FleetError::ValidationError)?;
                let params = self.active_params.clone();
                self.switch(scene, params, true).await
            }
            Command::SetBrightness(level) => self.set_brightness(level).await,
            Command::SetPower(on) => self.set_power(on).await,
            Command::Reset => {
                let scene = self.entry.config.startup_scene.clone().ok_or(FleetError::ValidationError)?;
                self.switch(scene, Map::new(), true).await
            }
            Command::SetDriver(kind) => self.set_driver(kind).await,
            Command::Shutdown => self.shutdown().await,
        }
    }

    fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    async fn set_run_status(&self, run_status: RunStatus, target_scene: Option<String>) {
        self.store
            .update_device(&self.host, |d| {
                d.run_status = run_status;
                d.target_scene = target_scene;
                d.generation_id = self.generation;
            })
            .await;
        self.publish_transition().await;
    }

    async fn publish_transition(&self) {
        if let Some(device) = self.store.device(&self.host).await {
            self.publisher.publish_transition(StateTransition::from_device(&device)).await;
        }
    }

    // -- commands -----------------------------------------------------------

    async fn switch(&mut self, scene_name: String, params: Map<String, Value>, clear: bool) -> Result<(), FleetError> {
        // Validate before mutating anything (spec.md §7: `ValidationError`
        // "Never mutates state"). An unknown scene or a missing capability
        // must leave the previously active scene, the generation, and the
        // Store's run_status/target_scene exactly as they were.
        let driver = self.entry.driver().await;
        let caps = driver.capabilities();
        self.scenes.check(&scene_name, &self.entry.config.device_type, &caps).await?;

        self.bump_generation();
        self.set_run_status(RunStatus::Switching, Some(scene_name.clone())).await;

        if let Some(old) = self.active_scene.take() {
            self.run_cleanup(&old).await;
        }

        if clear {
            if let Err(err) = driver.clear().await {
                warn!(host = %self.host, %err, "clear before switch failed");
            }
        }

        let scene = self.scenes.get(&scene_name).await?;
        let ctx = self.context(Arc::clone(&driver), &scene_name, params.clone());
        let init_result = tokio::time::timeout(INIT_CLEANUP_TIMEOUT, scene.init(&ctx)).await;
        match init_result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(host = %self.host, scene = %scene_name, %err, "scene init failed, aborting switch");
                self.set_run_status(RunStatus::Idle, None).await;
                return Err(FleetError::SceneRuntimeError);
            }
            Err(_) => {
                error!(host = %self.host, scene = %scene_name, "scene init timed out, aborting switch");
                self.set_run_status(RunStatus::Idle, None).await;
                return Err(FleetError::SceneRuntimeError);
            }
        }

        self.active_scene = Some(scene_name.clone());
        self.active_params = params;
        self.last_switch = Instant::now();
        self.failure_times.clear();
        self.next_delay_ms = 0;

        self.store
            .update_device(&self.host, |d| {
                d.active_scene = Some(scene_name.clone());
                d.target_scene = None;
                d.play_state = PlayState::Playing;
            })
            .await;
        self.set_run_status(RunStatus::Running, None).await;
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), FleetError> {
        self.store.update_device(&self.host, |d| d.play_state = PlayState::Paused).await;
        self.publish_transition().await;
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), FleetError> {
        // Resume does not bump generationId (spec.md §4.5): the same
        // render cadence continues as if it had never paused.
        self.store.update_device(&self.host, |d| d.play_state = PlayState::Playing).await;
        self.publish_transition().await;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), FleetError> {
        self.bump_generation();
        if let Some(old) = self.active_scene.take() {
            self.run_cleanup(&old).await;
        }
        let driver = self.entry.driver().await;
        let _ = driver.clear().await;
        let _ = driver.push().await;

        self.store
            .update_device(&self.host, |d| {
                d.active_scene = None;
                d.target_scene = None;
                d.play_state = PlayState::Stopped;
            })
            .await;
        self.set_run_status(RunStatus::Idle, None).await;
        Ok(())
    }

    async fn set_brightness(&mut self, level: u8) -> Result<(), FleetError> {
        let driver = self.entry.driver().await;
        driver.set_brightness(level).map_err(|_| FleetError::CapabilityError)?;
        self.store.update_device(&self.host, |d| d.brightness = level).await;
        self.publish_transition().await;
        Ok(())
    }

    async fn set_power(&mut self, on: bool) -> Result<(), FleetError> {
        let driver = self.entry.driver().await;
        driver.set_display_power(on).map_err(|_| FleetError::CapabilityError)?;
        self.store.update_device(&self.host, |d| d.display_on = on).await;
        self.publish_transition().await;
        Ok(())
    }

    async fn set_driver(&mut self, kind: DriverKind) -> Result<(), FleetError> {
        self.bump_generation();
        let old_driver = self.entry.driver().await;
        old_driver.shutdown().await;

        let new_driver = (self.driver_factory)(kind, &self.entry.config);
        if let Err(err) = new_driver.initialize().await {
            error!(host = %self.host, %err, "new driver failed to initialize on hot-swap");
            return Err(FleetError::TransportError);
        }
        self.entry.set_driver(new_driver).await;
        self.store.update_device(&self.host, |d| d.generation_id = self.generation).await;
        self.publish_transition().await;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), FleetError> {
        if let Some(scene) = self.active_scene.take() {
            self.run_cleanup(&scene).await;
        }
        let driver = self.entry.driver().await;
        driver.shutdown().await;
        self.store
            .update_device(&self.host, |d| {
                d.play_state = PlayState::Stopped;
                d.run_status = RunStatus::Idle;
            })
            .await;
        Ok(())
    }

    async fn run_cleanup(&self, scene_name: &str) {
        let Ok(scene) = self.scenes.get(scene_name).await else { return };
        let driver = self.entry.driver().await;
        let ctx = self.context(driver, scene_name, self.active_params.clone());
        if tokio::time::timeout(INIT_CLEANUP_TIMEOUT, scene.cleanup(&ctx)).await.is_err() {
            warn!(host = %self.host, scene = scene_name, "scene cleanup timed out");
        }
    }

    fn context(&self, driver: Arc<dyn Driver>, scene_id: &str, params: Map<String, Value>) -> SceneContext {
        SceneContext {
            host: self.host.clone(),
            device_type: self.entry.config.device_type.clone(),
            capabilities: driver.capabilities(),
            driver,
            store: Arc::clone(&self.store),
            scene_id: scene_id.to_owned(),
            params,
            now_ms: now_ms(),
        }
    }

    // -- render tick ----------------------------------------------------------

    async fn tick(&mut self) {
        let Some(scene_name) = self.active_scene.clone() else { return };
        let gen_at_start = self.generation;

        let driver = self.entry.driver().await;
        let Ok(scene) = self.scenes.get(&scene_name).await else {
            warn!(host = %self.host, scene = %scene_name, "active scene vanished from registry");
            return;
        };

        if let Some(timeout_minutes) = scene.metadata().timing.scene_timeout_minutes {
            if self.last_switch.elapsed() >= Duration::from_secs(timeout_minutes.saturating_mul(60)) {
                debug!(host = %self.host, scene = %scene_name, timeout_minutes, "scene timeout budget elapsed, auto-stopping");
                let _ = self.stop().await;
                return;
            }
        }

        let ctx = self.context(Arc::clone(&driver), &scene_name, self.active_params.clone());

        let t0 = Instant::now();
        let outcome = scene.render(&ctx).await;

        if gen_at_start != self.generation {
            // Stale tick: a command superseded this render while it was
            // in flight. Its effect is discarded (spec.md §4.5).
            self.store.update_device(&self.host, |d| d.skipped_count += 1).await;
            debug!(host = %self.host, scene = %scene_name, "discarding stale render tick");
            return;
        }

        match outcome {
            Ok(None) => {
                // The scene's render returned null: it is done (spec.md §3,
                // §8 property — `playState=complete` only on this signal).
                self.failure_times.clear();
                self.store
                    .update_device(&self.host, |d| {
                        d.play_state = PlayState::Complete;
                    })
                    .await;
                self.set_run_status(RunStatus::Idle, None).await;
            }
            Ok(Some(render)) => {
                self.failure_times.clear();
                match driver.push().await {
                    Ok(push) => {
                        self.publisher
                            .publish_metrics(&self.host, &scene_name, push.frametime_ms, self.generation)
                            .await;
                    }
                    Err(err) => {
                        warn!(host = %self.host, %err, "push failed after render");
                    }
                }
                let t_render = t0.elapsed().as_millis() as u64;
                let min_delay = driver.capabilities().min_delay_ms();
                let requested = if scene.metadata().timing.adaptive_timing {
                    // Adaptive timing (spec.md §4.5, opt-in per scene):
                    // widen the interval when rendering overran it.
                    render.next_delay_ms.max((t_render as f64 * 1.05) as u64)
                } else {
                    render.next_delay_ms
                };
                self.next_delay_ms = requested.clamp(min_delay, MAX_DELAY_MS);
            }
            Err(err) => {
                self.record_failure(&scene_name, err).await;
            }
        }
    }

    async fn record_failure(&mut self, scene_name: &str, err: impl std::fmt::Display) {
        let now = Instant::now();
        self.failure_times.push_back(now);
        while let Some(&front) = self.failure_times.front() {
            if now.duration_since(front) > FAILURE_WINDOW {
                self.failure_times.pop_front();
            } else {
                break;
            }
        }
        self.store
            .update_device(&self.host, |d| {
                d.consecutive_failures += 1;
                d.last_error = Some(err.to_string());
            })
            .await;
        error!(host = %self.host, scene = %scene_name, %err, "scene render failed");

        if self.failure_times.len() as u32 >= FAILURE_THRESHOLD {
            self.failure_times.clear();
            let fallback = self.entry.config.watchdog.as_ref().and_then(|w| w.fallback_scene.clone());
            match fallback {
                Some(fallback_scene) if fallback_scene != scene_name => {
                    warn!(
                        host = %self.host,
                        scene = %scene_name,
                        threshold = FAILURE_THRESHOLD,
                        fallback = %fallback_scene,
                        "failure threshold reached, switching to fallback scene"
                    );
                    if let Err(err) = self.switch(fallback_scene, Map::new(), true).await {
                        error!(host = %self.host, %err, "fallback scene switch failed, stopping instead");
                        let _ = self.stop().await;
                    }
                }
                _ => {
                    warn!(
                        host = %self.host,
                        scene = %scene_name,
                        threshold = FAILURE_THRESHOLD,
                        "failure threshold reached, falling back to idle"
                    );
                    let _ = self.stop().await;
                }
            }
        } else {
            // Keep the loop alive but slow down rather than spin on a
            // scene that is persistently failing.
            self.next_delay_ms = self.next_delay_ms.max(1_000);
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
