// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Soapbox integration tests: deterministic, scriptable
//! implementations of the provider and channel adapter traits, plus a full
//! pipeline harness over a temp database.

pub mod harness;
pub mod mock_channel;
pub mod mock_provider;

pub use harness::{PipelineHarness, PipelineHarnessBuilder};
pub use mock_channel::{CreatedPost, MockChannel};
pub use mock_provider::MockProvider;
