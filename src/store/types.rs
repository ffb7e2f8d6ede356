//! Remote store row types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Camera record (read-only to the engine)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Camera {
    pub id: Uuid,
    pub name: String,
    pub stream_url: String,
    pub location: Option<String>,
}

/// Detection model record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AiModel {
    pub id: Uuid,
    pub name: String,
    /// Storage path of the model artifact; a model without one cannot run
    pub model_path: Option<String>,
    pub is_active: bool,
    /// Owning server; only models bound to this server are eligible here
    pub server_id: Option<Uuid>,
}

/// Camera-model assignment (row in camera_models)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Assignment {
    pub camera_id: Uuid,
    pub model_id: Uuid,
}

/// A detection event ready for insertion
#[derive(Debug, Clone, Serialize)]
pub struct NewDetectionEvent {
    pub camera_id: Uuid,
    pub model_id: Uuid,
    pub event_type: String,
    /// 0-100 scale as stored in the events table
    pub confidence: f32,
    pub snapshot_url: String,
    /// Bounding box and any extra detection attributes
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Administrative command row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRow {
    pub id: Uuid,
    pub command_type: String,
    pub payload: serde_json::Value,
    pub status: CommandStatus,
    pub result: Option<String>,
}

/// Command lifecycle: pending -> processing -> {completed, failed}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Processing => "processing",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for CommandStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CommandStatus::Pending),
            "processing" => Ok(CommandStatus::Processing),
            "completed" => Ok(CommandStatus::Completed),
            "failed" => Ok(CommandStatus::Failed),
            other => Err(format!("unknown command status: {}", other)),
        }
    }
}

/// System settings singleton (alert toggles + transport credentials)
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct SystemSettings {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub alert_email: bool,
    #[serde(default)]
    pub alert_sms: bool,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<i32>,
    #[serde(default)]
    pub smtp_user: Option<String>,
    #[serde(default)]
    pub smtp_pass: Option<String>,
    #[serde(default)]
    pub smtp_from: Option<String>,
    #[serde(default)]
    pub retention_days: Option<i32>,
}

/// This server's registration row (ai_servers)
#[derive(Debug, Clone, Serialize)]
pub struct ServerRecord {
    pub id: Uuid,
    pub name: String,
    pub ip_address: String,
    pub port: i32,
    pub status: String,
}
