// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait for the generative text provider.

use async_trait::async_trait;

use crate::error::GenerateFailure;
use crate::types::{ProviderRequest, ProviderResponse};

/// Adapter for the generative text provider behind the content generator.
///
/// Implementations classify every failure at the point of origin; callers
/// never see a raw transport error. The timeout is caller-enforced -- an
/// implementation that hangs is cut off and classified as
/// [`GenerateFailure::ProviderTimeout`].
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Sends a completion request for a fully rendered prompt.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, GenerateFailure>;

    /// Issues a minimal probe request to verify connectivity and credentials.
    async fn probe(&self) -> Result<(), GenerateFailure>;
}
