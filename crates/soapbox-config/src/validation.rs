// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-empty paths, non-zero budgets, and ordered
//! backoff bounds.

use crate::diagnostic::ConfigError;
use crate::model::SoapboxConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &SoapboxConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.instance.name.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "instance.name must not be empty".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.pipeline.workers == 0 {
        errors.push(ConfigError::Validation {
            message: "pipeline.workers must be at least 1".to_string(),
        });
    }

    if config.pipeline.max_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "pipeline.max_attempts must be at least 1".to_string(),
        });
    }

    if config.pipeline.base_backoff_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "pipeline.base_backoff_secs must be at least 1".to_string(),
        });
    }

    if config.pipeline.max_backoff_secs < config.pipeline.base_backoff_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "pipeline.max_backoff_secs ({}) must be >= pipeline.base_backoff_secs ({})",
                config.pipeline.max_backoff_secs, config.pipeline.base_backoff_secs
            ),
        });
    }

    if config.pipeline.lease_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "pipeline.lease_secs must be at least 1".to_string(),
        });
    }

    if config.trigger.tick_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "trigger.tick_secs must be at least 1".to_string(),
        });
    }

    if config.trigger.batch_size == 0 {
        errors.push(ConfigError::Validation {
            message: "trigger.batch_size must be at least 1".to_string(),
        });
    }

    if config.backup.enabled && config.backup.directory.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "backup.directory must not be empty when backup.enabled = true".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
