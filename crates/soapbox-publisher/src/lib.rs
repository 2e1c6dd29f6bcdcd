// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel publishing for the Soapbox automation pipeline.
//!
//! [`HttpChannelApi`] speaks the publishing API's wire protocol;
//! [`ChannelPublisher`] adds credential resolution, local capability checks,
//! the duplicate-submit idempotency guard, and credential redaction.

pub mod client;
pub mod publisher;
pub mod redact;

pub use client::HttpChannelApi;
pub use publisher::ChannelPublisher;
