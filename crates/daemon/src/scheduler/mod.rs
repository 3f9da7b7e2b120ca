// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-device Scheduler (spec.md §4.5). See [`actor`] for the render loop
//! and [`handle`] for the mailbox API other components use to drive it.

mod actor;
mod command;
mod handle;

pub use actor::{DriverFactory, Scheduler};
pub use command::Command;
pub use handle::SchedulerHandle;
