// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits implemented by the external-service clients.

pub mod channel;
pub mod provider;

pub use channel::ChannelApi;
pub use provider::TextProvider;
