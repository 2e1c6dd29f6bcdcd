// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic drivers for the Soapbox pipeline.
//!
//! [`Trigger`] is the fine-grained pipeline tick (recover, claim, enqueue);
//! [`BackupTicker`] fires the backup manager on a cron schedule. Both take
//! `now` explicitly so tests drive them with synthetic clocks.

pub mod retention;
pub mod trigger;

pub use retention::BackupTicker;
pub use trigger::{TickSummary, Trigger};
