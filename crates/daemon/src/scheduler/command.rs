// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use pixoo_driver::DriverKind;
use serde_json::{Map, Value};
use tokio::sync::oneshot;

use crate::error::FleetError;

/// The scheduler actor's mailbox commands (spec.md §4.5). Processed one
/// at a time, strictly FIFO.
#[derive(Debug)]
pub enum Command {
    Switch { scene: String, params: Map<String, Value>, clear: bool },
    Pause,
    Resume,
    Stop,
    Restart,
    SetBrightness(u8),
    SetPower(bool),
    /// Re-issue the device's configured startup scene from scratch.
    Reset,
    /// Hot-swap the bound driver (spec.md §4.2); flows through the
    /// mailbox so the generation bump and the install happen as one step
    /// from the render loop's point of view.
    SetDriver(DriverKind),
    Shutdown,
}

/// A command plus the channel its caller waits on for the outcome. HTTP
/// handlers and the Watchdog both submit through this envelope; MQTT
/// command ingestion fires commands without waiting (`reply` is `None`).
pub struct Envelope {
    pub command: Command,
    pub reply: Option<oneshot::Sender<Result<(), FleetError>>>,
}

impl Envelope {
    pub fn fire_and_forget(command: Command) -> Self {
        Self { command, reply: None }
    }

    pub fn with_reply(command: Command) -> (Self, oneshot::Receiver<Result<(), FleetError>>) {
        let (tx, rx) = oneshot::channel();
        (Self { command, reply: Some(tx) }, rx)
    }

    pub fn ack(self, result: Result<(), FleetError>) {
        if let Some(reply) = self.reply {
            let _ = reply.send(result);
        }
    }
}
