// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device Registry (spec.md §4.2): the set of configured devices and the
//! driver instance bound to each. Grounded in the teacher's `PodRegistry`
//! (`crates/cli/src/broker/registry.rs`) for the read-mostly
//! `RwLock<HashMap<..>>` shape, and `mux/state.rs` for hot-swap-with-
//! generation-bump semantics.

use std::collections::HashMap;
use std::sync::Arc;

use pixoo_driver::{Driver, DriverKind};
use tokio::sync::RwLock;

use crate::config::DeviceConfig;
use crate::error::FleetError;

/// One registered device: its static configuration plus the currently
/// bound driver.
///
/// The render-loop `generationId` (spec.md §4.5) lives in the device's
/// Scheduler actor, not here — the registry only owns driver identity.
/// Hot-swap (`setDriver`) is always issued as a Scheduler command so the
/// generation bump and driver install happen as one atomic step from the
/// point of view of the render loop; this struct is where that install
/// lands.
pub struct DeviceEntry {
    pub config: DeviceConfig,
    driver: RwLock<Arc<dyn Driver>>,
}

impl DeviceEntry {
    pub fn new(config: DeviceConfig, driver: Arc<dyn Driver>) -> Self {
        Self { config, driver: RwLock::new(driver) }
    }

    pub async fn driver(&self) -> Arc<dyn Driver> {
        Arc::clone(&*self.driver.read().await)
    }

    pub async fn set_driver(&self, driver: Arc<dyn Driver>) {
        *self.driver.write().await = driver;
    }
}

/// Registry of all configured devices, keyed by host.
pub struct DeviceRegistry {
    entries: RwLock<HashMap<String, Arc<DeviceEntry>>>,
}

impl DeviceRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { entries: RwLock::new(HashMap::new()) })
    }

    pub async fn register(&self, config: DeviceConfig, driver: Arc<dyn Driver>) -> Arc<DeviceEntry> {
        let entry = Arc::new(DeviceEntry::new(config.clone(), driver));
        self.entries.write().await.insert(config.host.clone(), Arc::clone(&entry));
        entry
    }

    pub async fn get(&self, host: &str) -> Result<Arc<DeviceEntry>, FleetError> {
        self.entries.read().await.get(host).cloned().ok_or(FleetError::DeviceNotFound)
    }

    pub async fn list(&self) -> Vec<Arc<DeviceEntry>> {
        self.entries.read().await.values().cloned().collect()
    }

    pub async fn hosts(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    /// Rebind `host` to a freshly constructed driver (spec.md §4.2
    /// `setDriver`). Called by the device's Scheduler actor after it has
    /// already bumped its own `generationId` for the swap.
    pub async fn set_driver(&self, host: &str, driver: Arc<dyn Driver>) -> Result<(), FleetError> {
        let entry = self.get(host).await?;
        entry.set_driver(driver).await;
        Ok(())
    }

    pub async fn driver_kind(&self, host: &str) -> Result<DriverKind, FleetError> {
        let entry = self.get(host).await?;
        Ok(entry.config.driver.unwrap_or(DriverKind::Mock))
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
