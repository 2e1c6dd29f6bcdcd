// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential redaction for publish error text.
//!
//! Two complementary mechanisms:
//! 1. **Regex-based**: catches known secret shapes (Bearer headers,
//!    `access_token` query parameters) that a remote API might echo back.
//! 2. **Exact-match**: catches the channel credential itself, wherever it
//!    appears.
//!
//! Every error message the publisher returns passes through [`scrub`], so no
//! code path can persist or log a credential in plaintext.

use std::sync::LazyLock;

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

/// Known secret patterns to redact from output.
static REDACTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // Bearer tokens echoed in headers or error bodies.
        Regex::new(r"Bearer\s+[A-Za-z0-9._\-]{10,}").expect("bearer regex is valid"),
        // access_token query parameters.
        Regex::new(r"access_token=[A-Za-z0-9._\-]+").expect("token regex is valid"),
    ]
});

/// The redaction placeholder.
const REDACTED: &str = "[REDACTED]";

/// Redact secrets from a string using regex patterns and exact-match values.
pub fn scrub(input: &str, secrets: &[&SecretString]) -> String {
    let mut result = input.to_string();

    for pattern in REDACTION_PATTERNS.iter() {
        result = pattern.replace_all(&result, REDACTED).to_string();
    }

    // Longest first, so a secret that contains another is replaced whole.
    let mut values: Vec<&str> = secrets.iter().map(|s| s.expose_secret()).collect();
    values.sort_by_key(|v| std::cmp::Reverse(v.len()));
    for value in values {
        if !value.is_empty() {
            result = result.replace(value, REDACTED);
        }
    }

    result
}
