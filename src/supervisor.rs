//! Worker supervisor
//!
//! ## Responsibilities
//!
//! - Own the registry of running stream workers, keyed by (camera, model)
//! - Start workers (idempotent per key) and stop them with a full drain
//!
//! The registry is the single synchronized point of truth for "what is
//! live": a handle is registered before the worker touches any external
//! resource and removed only after the worker has released its frame stream,
//! so at most one worker ever exists per key, even across a restart.

use crate::store::{AiModel, Camera};
use crate::stream_worker::{run_worker, WorkerContext};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Unique identity of a running pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerKey {
    pub camera_id: Uuid,
    pub model_id: Uuid,
}

impl std::fmt::Display for WorkerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.camera_id, self.model_id)
    }
}

/// Registry entry; lives from start until drain completes
struct WorkerHandle {
    cancel: CancellationToken,
    /// Completed (via drop guard) when the worker has fully exited
    done: CancellationToken,
}

/// Owns and supervises the live worker set
pub struct WorkerSupervisor {
    ctx: WorkerContext,
    workers: Mutex<HashMap<WorkerKey, WorkerHandle>>,
}

impl WorkerSupervisor {
    pub fn new(ctx: WorkerContext) -> Self {
        Self {
            ctx,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn a worker for the key; no-op if one is already registered
    /// (including one still draining)
    pub async fn start(&self, camera: Camera, model: AiModel) {
        let key = WorkerKey {
            camera_id: camera.id,
            model_id: model.id,
        };

        let mut workers = self.workers.lock().await;
        if workers.contains_key(&key) {
            tracing::debug!(key = %key, "Worker already registered, start is a no-op");
            return;
        }

        let cancel = CancellationToken::new();
        let done = CancellationToken::new();

        // Register before the worker touches external resources so a racing
        // tick can never double-start the key
        workers.insert(
            key,
            WorkerHandle {
                cancel: cancel.clone(),
                done: done.clone(),
            },
        );

        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            // The guard completes `done` even if the pipeline panics
            let _liveness = done.drop_guard();
            run_worker(ctx, camera, model, cancel).await;
        });

        tracing::info!(key = %key, "Worker started");
    }

    /// Signal cancellation and wait until the worker has released its frame
    /// stream and exited, then drop the handle
    pub async fn stop(&self, key: WorkerKey) {
        let (cancel, done) = {
            let workers = self.workers.lock().await;
            match workers.get(&key) {
                Some(handle) => (handle.cancel.clone(), handle.done.clone()),
                None => return,
            }
        };

        cancel.cancel();
        done.cancelled().await;

        let mut workers = self.workers.lock().await;
        workers.remove(&key);
        tracing::info!(key = %key, "Worker drained");
    }

    /// Snapshot of the registered keys (draining workers included). Workers
    /// that exited on their own, without being asked to stop, are reaped
    /// here so the next reconcile pass can start them again.
    pub async fn current_keys(&self) -> HashSet<WorkerKey> {
        let mut workers = self.workers.lock().await;
        workers.retain(|key, handle| {
            let exited_unasked = handle.done.is_cancelled() && !handle.cancel.is_cancelled();
            if exited_unasked {
                tracing::warn!(key = %key, "Worker exited on its own, reaping handle");
            }
            !exited_unasked
        });
        workers.keys().copied().collect()
    }

    /// Drain every worker; used on shutdown
    pub async fn stop_all(&self) {
        let keys: Vec<WorkerKey> = self.current_keys().await.into_iter().collect();
        for key in keys {
            self.stop(key).await;
        }
    }
}
