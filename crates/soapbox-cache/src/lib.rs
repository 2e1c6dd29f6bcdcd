// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort TTL memoization cache.
//!
//! Bounds provider spend and latency under bursty scheduling: two posts with
//! identical template, context, and generation options inside the TTL window
//! share one provider call. The cache is never a correctness dependency --
//! `get` cannot fail, and the worst outcome of a cross-worker race is a
//! redundant provider call.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use soapbox_core::Template;
use tracing::debug;

/// Observable cache counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub backend: &'static str,
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process key/value store with per-entry expiry.
///
/// Shared across workers behind an `Arc`; interior locking only. Expiry is
/// lazy: an expired entry counts as a miss and is dropped on access.
pub struct ContentCache {
    entries: Mutex<HashMap<String, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    default_ttl: Duration,
}

impl ContentCache {
    /// Create a cache whose `set` uses `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            default_ttl,
        }
    }

    /// Look up a key. Never fails; absent and expired both read as `None`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, Instant::now())
    }

    /// Clock-injected variant of [`get`](Self::get), used by tests.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<String> {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            // A poisoned lock degrades to "absent", never to a failure.
            Err(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache expired");
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache miss");
                None
            }
        }
    }

    /// Store a value under the default TTL. Overwrites silently.
    pub fn set(&self, key: &str, value: &str) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store a value under an explicit TTL. Overwrites silently.
    pub fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) {
        self.set_at(key, value, ttl, Instant::now());
    }

    /// Clock-injected variant of [`set_with_ttl`](Self::set_with_ttl).
    pub fn set_at(&self, key: &str, value: &str, ttl: Duration, now: Instant) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: now + ttl,
                },
            );
        }
    }

    /// Invalidate everything. Operational recovery only -- the automation
    /// path never needs it.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().map(|e| e.len()).unwrap_or(0);
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
            backend: "memory",
        }
    }
}

/// Deterministic cache key over everything that influences generation.
///
/// Template id, model, sampling options, and the post-processing flags are
/// all part of the key; the context map is iterated in sorted order, so two
/// posts with equal inputs hash identically regardless of insertion order.
pub fn cache_key(template: &Template, context: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(template.id.0.as_bytes());
    hasher.update([0x1f]);
    hasher.update(template.model.as_bytes());
    hasher.update([0x1f]);
    hasher.update(format!("{:.4}", template.temperature).as_bytes());
    hasher.update([0x1f]);
    hasher.update(template.max_output_len.to_le_bytes());
    hasher.update(template.max_hashtags.to_le_bytes());
    hasher.update([
        template.include_hashtags as u8,
        template.include_emojis as u8,
    ]);
    for (key, value) in context {
        hasher.update([0x1e]);
        hasher.update(key.as_bytes());
        hasher.update([0x1f]);
        hasher.update(value.as_bytes());
    }
    format!("gen:{}", hex::encode(hasher.finalize()))
}
