// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use pixoo_driver::DriverKind;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::command::{Command, Envelope};
use crate::error::FleetError;

/// Capacity of a device's command mailbox. Bounded, like the teacher's
/// capacity-1 switch channel (`cli/switch.rs`) but wide enough that a
/// burst of MQTT commands does not spuriously apply back-pressure to
/// unrelated devices.
const MAILBOX_CAPACITY: usize = 32;

/// How long a caller waits for a command to be actioned before giving up
/// on the reply (the command itself still runs; this only affects the
/// caller's wait).
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// A cheap, cloneable reference to one device's scheduler mailbox.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Envelope>,
}

impl SchedulerHandle {
    pub fn new() -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        (Self { tx }, rx)
    }

    async fn submit(&self, command: Command) -> Result<(), FleetError> {
        let (envelope, rx) = Envelope::with_reply(command);
        self.tx.send(envelope).await.map_err(|_| FleetError::Internal)?;
        match tokio::time::timeout(REPLY_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(FleetError::Internal),
            Err(_) => Err(FleetError::Internal),
        }
    }

    /// Fire a command without waiting for an outcome — used for inbound
    /// MQTT commands, which only warn-log on drop (spec.md §4.6).
    pub fn fire_and_forget(&self, command: Command) -> Result<(), FleetError> {
        self.tx.try_send(Envelope::fire_and_forget(command)).map_err(|_| FleetError::Internal)
    }

    pub async fn switch(&self, scene: String, params: Map<String, Value>, clear: bool) -> Result<(), FleetError> {
        self.submit(Command::Switch { scene, params, clear }).await
    }

    pub async fn pause(&self) -> Result<(), FleetError> {
        self.submit(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<(), FleetError> {
        self.submit(Command::Resume).await
    }

    pub async fn stop(&self) -> Result<(), FleetError> {
        self.submit(Command::Stop).await
    }

    pub async fn restart(&self) -> Result<(), FleetError> {
        self.submit(Command::Restart).await
    }

    pub async fn set_brightness(&self, level: u8) -> Result<(), FleetError> {
        self.submit(Command::SetBrightness(level)).await
    }

    pub async fn set_power(&self, on: bool) -> Result<(), FleetError> {
        self.submit(Command::SetPower(on)).await
    }

    pub async fn reset(&self) -> Result<(), FleetError> {
        self.submit(Command::Reset).await
    }

    pub async fn set_driver(&self, kind: DriverKind) -> Result<(), FleetError> {
        self.submit(Command::SetDriver(kind)).await
    }

    pub async fn shutdown(&self) -> Result<(), FleetError> {
        self.submit(Command::Shutdown).await
    }
}
