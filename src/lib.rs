//! Argos Surveillance Engine
//!
//! Reconciles camera/model assignments against live analysis workers.
//!
//! ## Architecture
//!
//! 1. AssignmentReconciler - desired-vs-live diff, start/stop decisions
//! 2. WorkerSupervisor - registry of running pipelines, drain on stop
//! 3. StreamWorker - per (camera, model) sample/detect/record loop
//! 4. EventSink - snapshot upload + event persistence + alert fan-out
//! 5. CommandProcessor - administrative job queue consumer
//! 6. SettingsCache - read-replace view of the settings singleton
//! 7. ServerRegistry - registration row + heartbeat
//!
//! External collaborators (store, object storage, detector sidecar, frame
//! grabber, notification transports) sit behind trait seams with fakes in
//! the test suites.

pub mod command_processor;
pub mod detector;
pub mod error;
pub mod event_sink;
pub mod frame_source;
pub mod notifier;
pub mod object_store;
pub mod reconciler;
pub mod server_registry;
pub mod settings_cache;
pub mod state;
pub mod store;
pub mod stream_worker;
pub mod supervisor;

#[cfg(test)]
pub mod test_support;

pub use error::{Error, Result};
pub use state::{AppConfig, PipelineConfig};
