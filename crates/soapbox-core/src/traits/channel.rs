// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait for the publishing channel API.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::PublishFailure;

/// Adapter for the remote publishing API.
///
/// `client_ref` is the caller-chosen dedup key (the scheduled post's id): it
/// is submitted with every create call and queryable through [`find_post`],
/// which is what makes duplicate deliveries safe.
///
/// [`find_post`]: ChannelApi::find_post
#[async_trait]
pub trait ChannelApi: Send + Sync {
    /// Submits content to the page's feed and returns the remote post id.
    async fn create_post(
        &self,
        credential: &SecretString,
        remote_page_id: &str,
        content: &str,
        client_ref: &str,
    ) -> Result<String, PublishFailure>;

    /// Looks up a previously created post by its client reference.
    ///
    /// Returns `Ok(None)` when no post with that reference exists.
    async fn find_post(
        &self,
        credential: &SecretString,
        remote_page_id: &str,
        client_ref: &str,
    ) -> Result<Option<String>, PublishFailure>;

    /// Verifies that the credential is accepted by the remote API.
    async fn verify_credential(&self, credential: &SecretString) -> Result<(), PublishFailure>;
}
