// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver-level error taxonomy (spec.md §7: `CapabilityError`, `TransportError`).

use std::fmt;

/// Errors a [`crate::Driver`] implementation can return.
///
/// `NotSupported` is never fatal — it signals the caller (usually the
/// scheduler or a scene) to fall back, per spec.md §4.1: "An unsupported
/// optional op returns `NotSupported`; it is never a fatal error."
#[derive(Debug, Clone)]
pub enum DriverError {
    /// The operation is optional and this driver/device lacks the capability.
    NotSupported,
    /// The underlying transport (HTTP, MQTT broker) failed.
    Transport(String),
    /// The driver was asked to operate before `initialize()` succeeded.
    NotReady,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSupported => f.write_str("operation not supported by this driver"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::NotReady => f.write_str("driver not ready"),
        }
    }
}

impl std::error::Error for DriverError {}

pub type DriverResult<T> = Result<T, DriverError>;
