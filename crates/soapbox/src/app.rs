// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Component wiring: configuration in, a ready pipeline stack out.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use soapbox_backup::{BackupManager, RetentionPolicy};
use soapbox_cache::ContentCache;
use soapbox_config::SoapboxConfig;
use soapbox_core::SoapboxError;
use soapbox_generator::{ContentGenerator, ProviderClient};
use soapbox_pipeline::{Orchestrator, RetryPolicy as PipelineRetryPolicy};
use soapbox_publisher::{ChannelPublisher, HttpChannelApi};
use soapbox_storage::Store;

/// The assembled pipeline stack.
pub struct App {
    pub config: SoapboxConfig,
    pub store: Arc<Store>,
    pub cache: Arc<ContentCache>,
    pub generator: Arc<ContentGenerator>,
    pub publisher: Arc<ChannelPublisher>,
    pub orchestrator: Arc<Orchestrator>,
}

impl App {
    /// Open storage and construct every component from configuration.
    pub async fn build(config: SoapboxConfig) -> Result<Self, SoapboxError> {
        let store = Arc::new(Store::open(&config.storage.database_path).await?);

        let cache_ttl = Duration::from_secs(config.generation.cache_ttl_secs);
        let cache = Arc::new(ContentCache::new(cache_ttl));

        let api_key = SecretString::from(config.generation.api_key.clone().unwrap_or_default());
        let provider = Arc::new(ProviderClient::new(
            config.generation.api_url.clone(),
            &api_key,
            Duration::from_secs(config.generation.request_timeout_secs),
        )?);
        let generator = Arc::new(ContentGenerator::new(
            provider,
            Arc::clone(&cache),
            cache_ttl,
        ));

        let channel_api = Arc::new(HttpChannelApi::new(
            config.channel_api.api_url.clone(),
            Duration::from_secs(config.channel_api.request_timeout_secs),
        )?);
        let publisher = Arc::new(ChannelPublisher::new(channel_api));

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&store),
            Arc::clone(&generator),
            Arc::clone(&publisher),
            PipelineRetryPolicy::from_config(&config.pipeline),
            Duration::from_secs(config.pipeline.lease_secs),
            config.instance.name.clone(),
        ));

        Ok(Self {
            config,
            store,
            cache,
            generator,
            publisher,
            orchestrator,
        })
    }

    /// Backup manager over the configured database and archive directory.
    pub fn backup_manager(&self) -> BackupManager {
        BackupManager::new(
            &self.config.storage.database_path,
            &self.config.backup.directory,
            RetentionPolicy {
                max_count: self.config.backup.max_count.map(|n| n as usize),
                max_age_days: self.config.backup.max_age_days,
            },
        )
    }
}
