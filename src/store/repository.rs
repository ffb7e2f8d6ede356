//! Postgres repository
//!
//! Database access layer behind the RemoteStore trait.

use super::types::*;
use super::RemoteStore;
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

/// Postgres-backed remote store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create new repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_command(row: &sqlx::postgres::PgRow) -> Result<CommandRow> {
        let status_raw: String = row.get("status");
        let status = CommandStatus::from_str(&status_raw)
            .unwrap_or(CommandStatus::Failed);
        Ok(CommandRow {
            id: row.get("id"),
            command_type: row.get("command_type"),
            payload: row
                .try_get::<serde_json::Value, _>("payload")
                .unwrap_or(serde_json::Value::Null),
            status,
            result: row.get("result"),
        })
    }
}

#[async_trait]
impl RemoteStore for PgStore {
    async fn eligible_models(&self, server_id: Uuid) -> Result<Vec<AiModel>> {
        let models = sqlx::query_as::<_, AiModel>(
            "SELECT id, name, model_path, is_active, server_id
             FROM ai_models
             WHERE is_active = TRUE AND server_id = $1 AND model_path IS NOT NULL",
        )
        .bind(server_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(models)
    }

    async fn assignments_for_models(&self, model_ids: &[Uuid]) -> Result<Vec<Assignment>> {
        if model_ids.is_empty() {
            return Ok(Vec::new());
        }

        let assignments = sqlx::query_as::<_, Assignment>(
            "SELECT camera_id, ai_model_id AS model_id
             FROM camera_models
             WHERE ai_model_id = ANY($1)",
        )
        .bind(model_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(assignments)
    }

    async fn cameras_by_ids(&self, camera_ids: &[Uuid]) -> Result<Vec<Camera>> {
        if camera_ids.is_empty() {
            return Ok(Vec::new());
        }

        let cameras = sqlx::query_as::<_, Camera>(
            "SELECT id, name, stream_url, location
             FROM cameras
             WHERE id = ANY($1)",
        )
        .bind(camera_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(cameras)
    }

    async fn insert_event(&self, event: &NewDetectionEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO events
             (camera_id, ai_model_id, event_type, confidence, snapshot_url,
              metadata, acknowledged, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7)",
        )
        .bind(event.camera_id)
        .bind(event.model_id)
        .bind(&event.event_type)
        .bind(event.confidence)
        .bind(&event.snapshot_url)
        .bind(&event.metadata)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn pending_commands(&self) -> Result<Vec<CommandRow>> {
        let rows = sqlx::query(
            "SELECT id, command_type, payload, status, result
             FROM system_commands
             WHERE status = 'pending'
             ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_command).collect()
    }

    async fn claim_command(&self, id: Uuid) -> Result<bool> {
        // Single-row atomic transition guards against duplicate execution
        let result = sqlx::query(
            "UPDATE system_commands
             SET status = 'processing', updated_at = $2
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn finalize_command(&self, id: Uuid, status: CommandStatus, result: &str) -> Result<()> {
        sqlx::query(
            "UPDATE system_commands
             SET status = $2, result = $3, updated_at = $4
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(result)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_settings(&self) -> Result<SystemSettings> {
        let settings = sqlx::query_as::<_, SystemSettings>(
            "SELECT company_name, admin_email, alert_email, alert_sms,
                    smtp_host, smtp_port, smtp_user, smtp_pass, smtp_from,
                    retention_days
             FROM system_settings
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings.unwrap_or_default())
    }

    async fn upsert_server(&self, server: &ServerRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO ai_servers (id, name, ip_address, port, status, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE
             SET name = EXCLUDED.name,
                 ip_address = EXCLUDED.ip_address,
                 port = EXCLUDED.port,
                 status = EXCLUDED.status,
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(server.id)
        .bind(&server.name)
        .bind(&server.ip_address)
        .bind(server.port)
        .bind(&server.status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn touch_server(&self, id: Uuid, status: &str) -> Result<()> {
        sqlx::query(
            "UPDATE ai_servers SET status = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
