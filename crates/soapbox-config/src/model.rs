// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Soapbox automation pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. Retry budgets, lease durations, and tick cadence
//! are explicit values injected into component constructors -- never ambient
//! state -- so tests can run with deterministic policies.

use serde::{Deserialize, Serialize};

/// Top-level Soapbox configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SoapboxConfig {
    /// Instance identity and logging.
    #[serde(default)]
    pub instance: InstanceConfig,

    /// Durable storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Text provider settings for content generation.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Publishing API settings.
    #[serde(default)]
    pub channel_api: ChannelApiConfig,

    /// Orchestrator retry policy and worker pool.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Periodic due-selection tick.
    #[serde(default)]
    pub trigger: TriggerConfig,

    /// Backup snapshots and retention.
    #[serde(default)]
    pub backup: BackupConfig,
}

/// Instance identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceConfig {
    /// Name of this instance, used as the lease-holder prefix.
    #[serde(default = "default_instance_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            name: default_instance_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_instance_name() -> String {
    "soapbox".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Durable storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "soapbox.db".to_string()
}

/// Text provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Base URL of the text provider API.
    #[serde(default = "default_generation_api_url")]
    pub api_url: String,

    /// Provider API key. Usually supplied via `SOAPBOX_GENERATION_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// TTL for memoized generation results, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_url: default_generation_api_url(),
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_generation_api_url() -> String {
    "https://api.textsmith.example/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_cache_ttl_secs() -> u64 {
    300
}

/// Publishing API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelApiConfig {
    /// Base URL of the publishing API.
    #[serde(default = "default_channel_api_url")]
    pub api_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ChannelApiConfig {
    fn default() -> Self {
        Self {
            api_url: default_channel_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_channel_api_url() -> String {
    "https://pages.api.example/v18.0".to_string()
}

/// Orchestrator retry policy and worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Number of concurrent worker tasks draining the job queue.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Retry budget: a post that reaches this many attempts is failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff, in seconds.
    #[serde(default = "default_base_backoff_secs")]
    pub base_backoff_secs: u64,

    /// Cap on a single backoff delay, in seconds.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,

    /// Optional wall-clock retry cap: a post still retrying this many
    /// seconds past its due time is failed, independent of attempt count.
    #[serde(default)]
    pub max_retry_window_secs: Option<u64>,

    /// Lease duration for a claimed post, in seconds. A worker that dies
    /// holding a lease loses it after this long.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,

    /// Queue-level redelivery budget for infrastructure failures.
    #[serde(default = "default_queue_max_attempts")]
    pub queue_max_attempts: u32,

    /// Worker idle poll interval, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            base_backoff_secs: default_base_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            max_retry_window_secs: None,
            lease_secs: default_lease_secs(),
            queue_max_attempts: default_queue_max_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_backoff_secs() -> u64 {
    60
}

fn default_max_backoff_secs() -> u64 {
    3600
}

fn default_lease_secs() -> u64 {
    300
}

fn default_queue_max_attempts() -> u32 {
    3
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Periodic trigger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerConfig {
    /// Seconds between due-selection ticks.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Maximum posts claimed per tick. The rest wait for the next tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_tick_secs() -> u64 {
    300
}

fn default_batch_size() -> usize {
    50
}

/// Backup snapshot and retention configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    /// Whether the serve loop takes periodic snapshots at all.
    #[serde(default = "default_backup_enabled")]
    pub enabled: bool,

    /// Directory the archives are written to.
    #[serde(default = "default_backup_directory")]
    pub directory: String,

    /// Cron expression for the snapshot schedule.
    #[serde(default = "default_backup_schedule")]
    pub schedule: String,

    /// Keep at most this many archives; older ones are pruned.
    #[serde(default)]
    pub max_count: Option<u32>,

    /// Prune archives older than this many days.
    #[serde(default = "default_backup_max_age_days")]
    pub max_age_days: Option<u32>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: default_backup_enabled(),
            directory: default_backup_directory(),
            schedule: default_backup_schedule(),
            max_count: None,
            max_age_days: default_backup_max_age_days(),
        }
    }
}

fn default_backup_enabled() -> bool {
    true
}

fn default_backup_directory() -> String {
    "backups".to_string()
}

fn default_backup_schedule() -> String {
    // Daily at 03:00.
    "0 3 * * *".to_string()
}

fn default_backup_max_age_days() -> Option<u32> {
    Some(30)
}
