//! Server registration
//!
//! Upserts this engine's row in ai_servers at boot and keeps the liveness
//! timestamp fresh so the dashboard can tell online servers from dead ones.

use crate::error::Result;
use crate::store::{RemoteStore, ServerRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Registers and heartbeats this server in the remote store
pub struct ServerRegistry {
    store: Arc<dyn RemoteStore>,
    record: ServerRecord,
    heartbeat_interval: Duration,
}

impl ServerRegistry {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        record: ServerRecord,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            store,
            record,
            heartbeat_interval,
        }
    }

    pub fn server_id(&self) -> Uuid {
        self.record.id
    }

    /// Upsert the registration row with status online
    pub async fn register(&self) -> Result<()> {
        self.store.upsert_server(&self.record).await?;
        tracing::info!(
            server_id = %self.record.id,
            name = %self.record.name,
            "Server registered"
        );
        Ok(())
    }

    /// Background heartbeat loop until shutdown
    pub fn start_heartbeat(self: Arc<Self>, shutdown: CancellationToken) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.heartbeat_interval) => {}
                }

                if let Err(e) = self.store.touch_server(self.record.id, "online").await {
                    tracing::warn!(error = %e, "Heartbeat failed");
                }
            }
            tracing::info!("Heartbeat stopped");
        });
    }

    /// Best-effort offline mark on shutdown
    pub async fn mark_offline(&self) {
        if let Err(e) = self.store.touch_server(self.record.id, "offline").await {
            tracing::warn!(error = %e, "Failed to mark server offline");
        }
    }
}
