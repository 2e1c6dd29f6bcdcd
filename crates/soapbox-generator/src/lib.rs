// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content generation for the Soapbox automation pipeline.
//!
//! [`ProviderClient`] talks to the generative text provider and classifies
//! every failure; [`ContentGenerator`] wraps it with placeholder validation,
//! cache memoization, and hashtag/emoji/length post-processing.

pub mod client;
pub mod generator;
pub mod postprocess;

pub use client::ProviderClient;
pub use generator::ContentGenerator;
