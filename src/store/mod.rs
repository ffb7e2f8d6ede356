//! Remote store access
//!
//! ## Responsibilities
//!
//! - Query eligible models, assignments and cameras for reconciliation
//! - Insert detection events
//! - Claim and finalize administrative commands
//! - Read the settings singleton, upsert this server's registration
//!
//! All calls are plain request/response; a failure surfaces as an error and
//! the caller skips to its next poll tick.

mod repository;
mod types;

pub use repository::PgStore;
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Store operations consumed by the engine
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Active models bound to the given server that have a model artifact
    async fn eligible_models(&self, server_id: Uuid) -> Result<Vec<AiModel>>;

    /// Assignments whose model id is in the given set
    async fn assignments_for_models(&self, model_ids: &[Uuid]) -> Result<Vec<Assignment>>;

    /// Cameras by id set
    async fn cameras_by_ids(&self, camera_ids: &[Uuid]) -> Result<Vec<Camera>>;

    /// Insert one detection event row
    async fn insert_event(&self, event: &NewDetectionEvent) -> Result<()>;

    /// All commands currently pending
    async fn pending_commands(&self) -> Result<Vec<CommandRow>>;

    /// Atomically transition pending -> processing; false if already claimed
    async fn claim_command(&self, id: Uuid) -> Result<bool>;

    /// Terminal transition to completed/failed with a result string
    async fn finalize_command(&self, id: Uuid, status: CommandStatus, result: &str) -> Result<()>;

    /// Read the settings singleton
    async fn fetch_settings(&self) -> Result<SystemSettings>;

    /// Upsert this server's registration row
    async fn upsert_server(&self, server: &ServerRecord) -> Result<()>;

    /// Refresh the registration heartbeat timestamp/status
    async fn touch_server(&self, id: Uuid, status: &str) -> Result<()>;
}
