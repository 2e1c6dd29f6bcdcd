// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration error reporting.
//!
//! Figment parse errors and post-deserialization validation failures are
//! collected into [`ConfigError`] values and rendered as a plain list, one
//! line per problem, so the operator sees every config mistake in one run
//! instead of fixing them one at a time.

use thiserror::Error;

/// A single configuration problem.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML / env input failed to deserialize.
    #[error("config parse error: {message}")]
    Parse { message: String },

    /// The deserialized config violates a semantic constraint.
    #[error("config validation error: {message}")]
    Validation { message: String },
}

/// Convert a figment extraction error into `ConfigError`s.
///
/// Figment chains multiple failures through its error iterator; each becomes
/// its own entry so none are hidden.
pub fn figment_to_config_errors(err: figment::Error) -> Vec<ConfigError> {
    err.into_iter()
        .map(|e| ConfigError::Parse {
            message: e.to_string(),
        })
        .collect()
}

/// Print every collected config error to stderr.
pub fn render_errors(errors: &[ConfigError]) {
    eprintln!("soapbox: configuration is invalid:");
    for err in errors {
        eprintln!("  - {err}");
    }
    eprintln!("fix the above and run again");
}
