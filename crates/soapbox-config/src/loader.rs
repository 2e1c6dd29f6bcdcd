// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./soapbox.toml` > `~/.config/soapbox/soapbox.toml`
//! > `/etc/soapbox/soapbox.toml` with environment variable overrides via the
//! `SOAPBOX_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SoapboxConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/soapbox/soapbox.toml` (system-wide)
/// 3. `~/.config/soapbox/soapbox.toml` (user XDG config)
/// 4. `./soapbox.toml` (local directory)
/// 5. `SOAPBOX_*` environment variables
pub fn load_config() -> Result<SoapboxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SoapboxConfig::default()))
        .merge(Toml::file("/etc/soapbox/soapbox.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("soapbox/soapbox.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("soapbox.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<SoapboxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SoapboxConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SoapboxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SoapboxConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `SOAPBOX_GENERATION_API_KEY` must map to
/// `generation.api_key`, not `generation.api.key`.
fn env_provider() -> Env {
    Env::prefixed("SOAPBOX_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped,
        // e.g. SOAPBOX_PIPELINE_MAX_ATTEMPTS -> "pipeline_max_attempts".
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("instance_", "instance.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("generation_", "generation.", 1)
            .replacen("channel_api_", "channel_api.", 1)
            .replacen("pipeline_", "pipeline.", 1)
            .replacen("trigger_", "trigger.", 1)
            .replacen("backup_", "backup.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_toml_overrides_defaults() {
        let config = load_config_from_str(
            r#"
            [instance]
            name = "posting-box"

            [trigger]
            tick_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.instance.name, "posting-box");
        assert_eq!(config.trigger.tick_secs, 60);
        assert_eq!(config.pipeline.max_attempts, 5, "defaults still present");
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.storage.database_path, "soapbox.db");
    }

    #[test]
    fn invalid_value_type_is_an_error() {
        let result = load_config_from_str(
            r#"
            [pipeline]
            workers = "many"
            "#,
        );
        assert!(result.is_err());
    }
}
