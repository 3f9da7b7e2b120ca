// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scene Registry (spec.md §4.4): process-wide catalogue of known scenes.
//! Read-mostly, same `RwLock<HashMap<..>>` shape as the Device Registry.

use std::collections::HashMap;
use std::sync::Arc;

use pixoo_driver::DisplayCapabilities;
use tokio::sync::RwLock;

use super::{Scene, SceneError};
use crate::error::FleetError;

pub struct SceneRegistry {
    scenes: RwLock<HashMap<String, Arc<dyn Scene>>>,
}

impl SceneRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { scenes: RwLock::new(HashMap::new()) })
    }

    /// A registry pre-populated with the built-in demonstration scenes
    /// (spec.md §4.4: "ships with at least `static_text` and `clock`").
    pub async fn with_builtins() -> Arc<Self> {
        let registry = Self::new();
        registry.register(Arc::new(super::static_text_scene())).await;
        registry.register(Arc::new(super::clock_scene())).await;
        registry
    }

    pub async fn register(&self, scene: Arc<dyn Scene>) {
        let id = scene.metadata().id.clone();
        self.scenes.write().await.insert(id, scene);
    }

    pub async fn get(&self, id: &str) -> Result<Arc<dyn Scene>, FleetError> {
        self.scenes.read().await.get(id).cloned().ok_or(FleetError::ValidationError)
    }

    pub async fn list(&self) -> Vec<Arc<dyn Scene>> {
        self.scenes.read().await.values().cloned().collect()
    }

    /// Scenes compatible with a given device type and its capabilities
    /// (spec.md §4.4 `list(deviceType?)`).
    pub async fn list_for_device(&self, device_type: &str, caps: &DisplayCapabilities) -> Vec<Arc<dyn Scene>> {
        self.scenes
            .read()
            .await
            .values()
            .filter(|scene| scene.requirements().check(device_type, caps).is_ok())
            .cloned()
            .collect()
    }

    /// Validate that `device_type`/`caps` satisfy a scene's declared
    /// requirements before the Scheduler attempts to switch to it
    /// (spec.md §4.5 `switch` precondition).
    pub async fn check(&self, id: &str, device_type: &str, caps: &DisplayCapabilities) -> Result<(), FleetError> {
        let scene = self.get(id).await?;
        scene
            .requirements()
            .check(device_type, caps)
            .map_err(|_: SceneError| FleetError::CapabilityError)
    }
}
