// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock text provider for deterministic testing.
//!
//! `MockProvider` implements `TextProvider` with a FIFO queue of scripted
//! outcomes, enabling fast, CI-runnable tests without external API calls.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use soapbox_core::{GenerateFailure, ProviderRequest, ProviderResponse, TextProvider};

/// A mock text provider that returns pre-configured outcomes.
///
/// Outcomes are popped from a FIFO queue. When the queue is empty, a default
/// "mock response" text is returned. Every `complete` call is counted, which
/// is how cache tests assert "provider invoked at most once".
pub struct MockProvider {
    outcomes: Mutex<VecDeque<Result<String, GenerateFailure>>>,
    calls: AtomicUsize,
    probes: AtomicUsize,
    probe_failure: Mutex<Option<GenerateFailure>>,
}

impl MockProvider {
    /// Create a mock provider with an empty outcome queue.
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
            probe_failure: Mutex::new(None),
        }
    }

    /// Create a mock provider pre-loaded with successful responses.
    pub fn with_responses(responses: Vec<String>) -> Self {
        let provider = Self::new();
        {
            let mut outcomes = provider.outcomes.lock().expect("mock lock");
            outcomes.extend(responses.into_iter().map(Ok));
        }
        provider
    }

    /// Queue a successful response.
    pub fn push_response(&self, text: &str) {
        self.outcomes
            .lock()
            .expect("mock lock")
            .push_back(Ok(text.to_string()));
    }

    /// Queue a classified failure.
    pub fn push_failure(&self, failure: GenerateFailure) {
        self.outcomes
            .lock()
            .expect("mock lock")
            .push_back(Err(failure));
    }

    /// Make every subsequent probe fail with the given classification.
    pub fn set_probe_failure(&self, failure: GenerateFailure) {
        *self.probe_failure.lock().expect("mock lock") = Some(failure);
    }

    /// Number of `complete` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of `probe` calls so far.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Result<String, GenerateFailure> {
        self.outcomes
            .lock()
            .expect("mock lock")
            .pop_front()
            .unwrap_or_else(|| Ok("mock response".to_string()))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextProvider for MockProvider {
    async fn complete(
        &self,
        _request: ProviderRequest,
    ) -> Result<ProviderResponse, GenerateFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.next_outcome().map(|text| ProviderResponse { text })
    }

    async fn probe(&self) -> Result<(), GenerateFailure> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        match self.probe_failure.lock().expect("mock lock").clone() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}
