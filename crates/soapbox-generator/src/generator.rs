// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content generation orchestration: placeholder validation, memoization,
//! the provider call, and post-processing.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use soapbox_core::{
    GenerateFailure, GeneratedContent, ProviderRequest, Template, TextProvider,
};
use soapbox_cache::{ContentCache, cache_key};
use tracing::{debug, info};

use crate::postprocess;

/// Named `{placeholder}` slots in a prompt pattern.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder regex is valid"));

/// Cache key for the memoized provider connection test.
const PROBE_CACHE_KEY: &str = "provider:probe";

/// Generates post content from a template plus render context.
///
/// Holds the provider adapter and the shared cache; the orchestrator calls
/// [`generate`](ContentGenerator::generate) once per generation step.
pub struct ContentGenerator {
    provider: Arc<dyn TextProvider>,
    cache: Arc<ContentCache>,
    cache_ttl: Duration,
}

impl ContentGenerator {
    pub fn new(
        provider: Arc<dyn TextProvider>,
        cache: Arc<ContentCache>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            cache_ttl,
        }
    }

    /// Generate content for a template and context.
    ///
    /// Placeholder validation runs first and fails without any network
    /// traffic. A cache hit short-circuits the provider call and is flagged
    /// via [`GeneratedContent::cached`]. On a miss the provider output is
    /// post-processed, stored, and returned.
    pub async fn generate(
        &self,
        template: &Template,
        context: &BTreeMap<String, String>,
    ) -> Result<GeneratedContent, GenerateFailure> {
        let prompt = render_prompt(&template.prompt, context)?;

        let key = cache_key(template, context);
        if let Some(text) = self.cache.get(&key) {
            debug!(template = %template.id.0, "generation served from cache");
            return Ok(GeneratedContent { text, cached: true });
        }

        let request = ProviderRequest {
            prompt,
            model: template.model.clone(),
            temperature: template.temperature,
            max_output_length: template.max_output_len,
        };
        let response = self.provider.complete(request).await?;

        let text = postprocess::apply(&response.text, template, context);
        self.cache.set_with_ttl(&key, &text, self.cache_ttl);
        info!(template = %template.id.0, chars = text.chars().count(), "content generated");

        Ok(GeneratedContent {
            text,
            cached: false,
        })
    }

    /// Probe the provider and memoize the outcome.
    ///
    /// Used by the status command; the cached result keeps repeated status
    /// calls from spending provider quota.
    pub async fn test_connection(&self) -> bool {
        if let Some(cached) = self.cache.get(PROBE_CACHE_KEY) {
            return cached == "ok";
        }
        let ok = match self.provider.probe().await {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %err, "provider probe failed");
                false
            }
        };
        self.cache
            .set_with_ttl(PROBE_CACHE_KEY, if ok { "ok" } else { "failed" }, self.cache_ttl);
        ok
    }
}

/// Extract the distinct placeholder names in a prompt pattern.
pub fn placeholders(pattern: &str) -> Vec<String> {
    let mut names: Vec<String> = PLACEHOLDER_RE
        .captures_iter(pattern)
        .map(|cap| cap[1].to_string())
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Render the prompt, substituting every placeholder from the context.
///
/// Fails with [`GenerateFailure::MissingContext`] on the first unresolvable
/// placeholder -- before any provider traffic.
pub fn render_prompt(
    pattern: &str,
    context: &BTreeMap<String, String>,
) -> Result<String, GenerateFailure> {
    for name in placeholders(pattern) {
        if !context.contains_key(&name) {
            return Err(GenerateFailure::MissingContext { placeholder: name });
        }
    }
    let mut rendered = pattern.to_string();
    for (key, value) in context {
        rendered = rendered.replace(&format!("{{{key}}}"), value);
    }
    Ok(rendered)
}
