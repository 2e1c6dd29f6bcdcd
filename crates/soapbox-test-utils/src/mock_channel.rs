// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel API for deterministic testing.
//!
//! `MockChannel` implements `ChannelApi` with an in-memory remote-post
//! registry, so the idempotency guard behaves exactly like a real remote:
//! a `client_ref` that was submitted once resolves through `find_post`
//! forever after.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use secrecy::SecretString;
use soapbox_core::{ChannelApi, PublishFailure};

/// A post captured by [`MockChannel::create_post`].
#[derive(Debug, Clone)]
pub struct CreatedPost {
    pub remote_page_id: String,
    pub content: String,
    pub client_ref: String,
}

/// A mock publishing API with scriptable failures.
pub struct MockChannel {
    /// client_ref -> remote post id, the "remote side" state.
    existing: Mutex<HashMap<String, String>>,
    created: Mutex<Vec<CreatedPost>>,
    create_failures: Mutex<VecDeque<PublishFailure>>,
    find_failures: Mutex<VecDeque<PublishFailure>>,
    verify_failure: Mutex<Option<PublishFailure>>,
    create_calls: AtomicUsize,
    find_calls: AtomicUsize,
    next_id: AtomicUsize,
}

impl MockChannel {
    /// Create a mock channel with empty state.
    pub fn new() -> Self {
        Self {
            existing: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
            create_failures: Mutex::new(VecDeque::new()),
            find_failures: Mutex::new(VecDeque::new()),
            verify_failure: Mutex::new(None),
            create_calls: AtomicUsize::new(0),
            find_calls: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Queue a failure for the next `create_post` call.
    pub fn push_create_failure(&self, failure: PublishFailure) {
        self.create_failures
            .lock()
            .expect("mock lock")
            .push_back(failure);
    }

    /// Queue a failure for the next `find_post` call.
    pub fn push_find_failure(&self, failure: PublishFailure) {
        self.find_failures
            .lock()
            .expect("mock lock")
            .push_back(failure);
    }

    /// Make every subsequent `verify_credential` fail.
    pub fn set_verify_failure(&self, failure: PublishFailure) {
        *self.verify_failure.lock().expect("mock lock") = Some(failure);
    }

    /// Seed a pre-existing remote post, as if a prior submit landed.
    pub fn seed_existing(&self, client_ref: &str, remote_post_id: &str) {
        self.existing
            .lock()
            .expect("mock lock")
            .insert(client_ref.to_string(), remote_post_id.to_string());
    }

    /// All posts created through `create_post`.
    pub fn created_posts(&self) -> Vec<CreatedPost> {
        self.created.lock().expect("mock lock").clone()
    }

    /// Number of `create_post` calls so far.
    pub fn create_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of `find_post` calls so far.
    pub fn find_count(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelApi for MockChannel {
    async fn create_post(
        &self,
        _credential: &SecretString,
        remote_page_id: &str,
        content: &str,
        client_ref: &str,
    ) -> Result<String, PublishFailure> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.create_failures.lock().expect("mock lock").pop_front() {
            return Err(failure);
        }
        let id = format!(
            "{}_{}",
            remote_page_id,
            self.next_id.fetch_add(1, Ordering::SeqCst)
        );
        self.existing
            .lock()
            .expect("mock lock")
            .insert(client_ref.to_string(), id.clone());
        self.created.lock().expect("mock lock").push(CreatedPost {
            remote_page_id: remote_page_id.to_string(),
            content: content.to_string(),
            client_ref: client_ref.to_string(),
        });
        Ok(id)
    }

    async fn find_post(
        &self,
        _credential: &SecretString,
        _remote_page_id: &str,
        client_ref: &str,
    ) -> Result<Option<String>, PublishFailure> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.find_failures.lock().expect("mock lock").pop_front() {
            return Err(failure);
        }
        Ok(self
            .existing
            .lock()
            .expect("mock lock")
            .get(client_ref)
            .cloned())
    }

    async fn verify_credential(&self, _credential: &SecretString) -> Result<(), PublishFailure> {
        match self.verify_failure.lock().expect("mock lock").clone() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}
