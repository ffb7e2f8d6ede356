//! Command processor
//!
//! ## Responsibilities
//!
//! - Poll the system_commands queue for pending rows
//! - Claim each atomically (pending -> processing), execute, finalize
//!
//! Handlers are isolated: one command's failure never affects the rest of
//! the batch or the loop. Unknown command types complete with a "not
//! supported" result so new dashboard features don't show up as errors.

use crate::error::Result;
use crate::notifier::{EventSummary, Notifier};
use crate::settings_cache::SettingsCache;
use crate::store::{CommandRow, CommandStatus, RemoteStore, SystemSettings};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Polls and executes administrative commands
pub struct CommandProcessor {
    store: Arc<dyn RemoteStore>,
    settings: Arc<SettingsCache>,
    notifier: Arc<dyn Notifier>,
    poll_interval: Duration,
}

impl CommandProcessor {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        settings: Arc<SettingsCache>,
        notifier: Arc<dyn Notifier>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            settings,
            notifier,
            poll_interval,
        }
    }

    /// Background polling loop until shutdown
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!(
            interval_sec = self.poll_interval.as_secs(),
            "Command processor started"
        );

        tokio::spawn(async move {
            loop {
                if let Err(e) = self.tick().await {
                    tracing::error!(error = %e, "Command poll failed");
                }

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
            tracing::info!("Command processor stopped");
        });
    }

    /// One poll pass over the pending queue
    pub async fn tick(&self) -> Result<()> {
        let pending = self.store.pending_commands().await?;

        for command in pending {
            // Claim before execution; losing the claim means another
            // processor got there first
            match self.store.claim_command(command.id).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::error!(command_id = %command.id, error = %e, "Claim failed");
                    continue;
                }
            }

            let (status, result) = match self.execute(&command).await {
                Ok(result) => (CommandStatus::Completed, result),
                Err(e) => {
                    tracing::warn!(
                        command_id = %command.id,
                        command_type = %command.command_type,
                        error = %e,
                        "Command execution failed"
                    );
                    (CommandStatus::Failed, e.to_string())
                }
            };

            if let Err(e) = self
                .store
                .finalize_command(command.id, status, &result)
                .await
            {
                tracing::error!(command_id = %command.id, error = %e, "Finalize failed");
            } else {
                tracing::info!(
                    command_id = %command.id,
                    command_type = %command.command_type,
                    status = status.as_str(),
                    "Command finalized"
                );
            }
        }

        Ok(())
    }

    async fn execute(&self, command: &CommandRow) -> Result<String> {
        match command.command_type.as_str() {
            "test_email" => self.handle_test_email(command).await,
            "refresh_settings" => {
                self.settings.force_refresh().await?;
                Ok("Settings cache refreshed".to_string())
            }
            other => Ok(format!("Command type '{}' not supported", other)),
        }
    }

    /// Send a test email using current settings merged with the command
    /// payload (payload fields win, so the dashboard can test unsaved values)
    async fn handle_test_email(&self, command: &CommandRow) -> Result<String> {
        let settings = self.settings.current().await;
        let merged = merge_settings(&settings, &command.payload)?;

        let to = merged.admin_email.clone().ok_or_else(|| {
            crate::error::Error::Notify("no target address in settings or payload".to_string())
        })?;

        let summary = EventSummary {
            camera_name: "system".to_string(),
            label: "test alert".to_string(),
            confidence: 100.0,
            snapshot_url: String::new(),
        };

        self.notifier.send_email(&merged, &summary).await?;
        Ok(format!("Test email sent to {}", to))
    }
}

/// Overlay non-null payload fields onto the settings singleton
fn merge_settings(settings: &SystemSettings, payload: &serde_json::Value) -> Result<SystemSettings> {
    let mut base = serde_json::to_value(settings)?;

    if let (Some(base_map), Some(overlay)) = (base.as_object_mut(), payload.as_object()) {
        for (key, value) in overlay {
            if !value.is_null() {
                base_map.insert(key.clone(), value.clone());
            }
        }
    }

    Ok(serde_json::from_value(base)?)
}
