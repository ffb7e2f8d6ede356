//! Settings cache
//!
//! Read-replace cache over the system_settings singleton. Every reader shares
//! one cached copy; staleness is bounded by the refresh interval (60s by
//! default). A failed refresh serves the stale copy and logs.

use crate::error::Result;
use crate::store::{RemoteStore, SystemSettings};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct CachedSettings {
    settings: SystemSettings,
    fetched_at: Instant,
}

/// Cached view of the settings singleton
pub struct SettingsCache {
    store: Arc<dyn RemoteStore>,
    refresh_interval: Duration,
    cache: RwLock<Option<CachedSettings>>,
}

impl SettingsCache {
    pub fn new(store: Arc<dyn RemoteStore>, refresh_interval: Duration) -> Self {
        Self {
            store,
            refresh_interval,
            cache: RwLock::new(None),
        }
    }

    /// Current settings, refreshing when the cached copy is stale
    pub async fn current(&self) -> SystemSettings {
        {
            let cache = self.cache.read().await;
            if let Some(ref cached) = *cache {
                if cached.fetched_at.elapsed() < self.refresh_interval {
                    return cached.settings.clone();
                }
            }
        }

        match self.force_refresh().await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "Settings refresh failed, serving stale copy");
                let cache = self.cache.read().await;
                cache
                    .as_ref()
                    .map(|c| c.settings.clone())
                    .unwrap_or_default()
            }
        }
    }

    /// Fetch and replace the cached copy
    pub async fn force_refresh(&self) -> Result<SystemSettings> {
        let settings = self.store.fetch_settings().await?;

        let mut cache = self.cache.write().await;
        *cache = Some(CachedSettings {
            settings: settings.clone(),
            fetched_at: Instant::now(),
        });

        tracing::debug!("Settings cache refreshed");
        Ok(settings)
    }
}
