//! Assignment reconciler
//!
//! ## Responsibilities
//!
//! - Poll the remote store for the desired (camera, model) set
//! - Diff against the supervisor's live keys
//! - Start missing workers, stop-and-drain orphaned ones
//!
//! A failed store query leaves the live set untouched until the next
//! successful tick. Starts return immediately (the supervisor registers the
//! handle synchronously); stops wait for the drain so the next tick cannot
//! race a duplicate key.

use crate::error::Result;
use crate::store::{AiModel, Camera, RemoteStore};
use crate::supervisor::{WorkerKey, WorkerSupervisor};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Reconciles desired assignments against live workers
pub struct AssignmentReconciler {
    store: Arc<dyn RemoteStore>,
    supervisor: Arc<WorkerSupervisor>,
    server_id: Uuid,
    tick_interval: Duration,
}

impl AssignmentReconciler {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        supervisor: Arc<WorkerSupervisor>,
        server_id: Uuid,
        tick_interval: Duration,
    ) -> Self {
        Self {
            store,
            supervisor,
            server_id,
            tick_interval,
        }
    }

    /// Background reconciliation loop until shutdown
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!(
            server_id = %self.server_id,
            interval_sec = self.tick_interval.as_secs(),
            "Assignment reconciler started"
        );

        tokio::spawn(async move {
            loop {
                if let Err(e) = self.tick().await {
                    tracing::error!(error = %e, "Reconciliation tick failed");
                }

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.tick_interval) => {}
                }
            }
            tracing::info!("Assignment reconciler stopped");
        });
    }

    /// One reconciliation pass
    pub async fn tick(&self) -> Result<()> {
        let desired = self.desired_set().await?;
        let live = self.supervisor.current_keys().await;

        for (key, (camera, model)) in &desired {
            if !live.contains(key) {
                self.supervisor.start(camera.clone(), model.clone()).await;
            }
        }

        for key in live {
            if !desired.contains_key(&key) {
                tracing::info!(key = %key, "Assignment gone, draining worker");
                self.supervisor.stop(key).await;
            }
        }

        Ok(())
    }

    /// Desired workers: eligible model × active assignment × existing camera
    async fn desired_set(&self) -> Result<HashMap<WorkerKey, (Camera, AiModel)>> {
        let models = self.store.eligible_models(self.server_id).await?;
        let model_ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
        let models_by_id: HashMap<Uuid, AiModel> =
            models.into_iter().map(|m| (m.id, m)).collect();

        let assignments = self.store.assignments_for_models(&model_ids).await?;

        let mut camera_ids: Vec<Uuid> = assignments.iter().map(|a| a.camera_id).collect();
        camera_ids.sort_unstable();
        camera_ids.dedup();

        let cameras = self.store.cameras_by_ids(&camera_ids).await?;
        let cameras_by_id: HashMap<Uuid, Camera> =
            cameras.into_iter().map(|c| (c.id, c)).collect();

        let mut desired = HashMap::new();
        for assignment in assignments {
            // An assignment pointing at a vanished camera is skipped, not an
            // error; the dashboard may delete cameras out from under us
            let Some(camera) = cameras_by_id.get(&assignment.camera_id) else {
                continue;
            };
            let Some(model) = models_by_id.get(&assignment.model_id) else {
                continue;
            };

            desired.insert(
                WorkerKey {
                    camera_id: camera.id,
                    model_id: model.id,
                },
                (camera.clone(), model.clone()),
            );
        }

        Ok(desired)
    }
}
