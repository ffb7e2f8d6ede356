//! Argos Surveillance Engine
//!
//! Main entry point: wires the store, the pipelines' collaborators and the
//! background loops, then waits for SIGINT and drains everything.

use argos_engine::command_processor::CommandProcessor;
use argos_engine::detector::InferenceClient;
use argos_engine::event_sink::EventSink;
use argos_engine::frame_source::FfmpegFrameSource;
use argos_engine::notifier::SystemNotifier;
use argos_engine::object_store::HttpObjectStore;
use argos_engine::reconciler::AssignmentReconciler;
use argos_engine::server_registry::ServerRegistry;
use argos_engine::settings_cache::SettingsCache;
use argos_engine::store::{PgStore, RemoteStore, ServerRecord};
use argos_engine::stream_worker::WorkerContext;
use argos_engine::supervisor::WorkerSupervisor;
use argos_engine::AppConfig;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "argos_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Argos engine v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        server_id = %config.server_id,
        database_url = %config.database_url,
        storage_url = %config.storage_url,
        inference_url = %config.inference_url,
        "Configuration loaded"
    );

    // Create database pool
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await?;

    tracing::info!("Database connected");

    let store: Arc<dyn RemoteStore> = Arc::new(PgStore::new(pool));
    let objects = Arc::new(HttpObjectStore::new(
        config.storage_url.clone(),
        config.storage_service_key.clone(),
    ));
    let notifier = Arc::new(SystemNotifier::new(config.sms_gateway_url.clone()));
    let settings = Arc::new(SettingsCache::new(store.clone(), config.settings_refresh));

    // Register this server and start the heartbeat
    let registry = Arc::new(ServerRegistry::new(
        store.clone(),
        ServerRecord {
            id: config.server_id,
            name: config.server_name.clone(),
            ip_address: config.server_ip.clone(),
            port: config.server_port,
            status: "online".to_string(),
        },
        config.heartbeat_interval,
    ));
    registry.register().await?;

    let shutdown = CancellationToken::new();
    registry.clone().start_heartbeat(shutdown.clone());

    // Pipeline collaborators shared by all workers
    let sink = Arc::new(EventSink::new(
        store.clone(),
        objects,
        settings.clone(),
        notifier.clone(),
        config.snapshot_bucket.clone(),
    ));
    let supervisor = Arc::new(WorkerSupervisor::new(WorkerContext {
        loader: Arc::new(InferenceClient::new(config.inference_url.clone())),
        frames: Arc::new(FfmpegFrameSource::default()),
        recorder: sink,
        config: config.pipeline.clone(),
    }));

    // Start the reconciliation loop
    let reconciler = Arc::new(AssignmentReconciler::new(
        store.clone(),
        supervisor.clone(),
        config.server_id,
        config.reconcile_interval,
    ));
    reconciler.start(shutdown.clone());

    // Start the command processor
    let commands = Arc::new(CommandProcessor::new(
        store,
        settings,
        notifier,
        config.command_poll_interval,
    ));
    commands.start(shutdown.clone());

    tracing::info!("Engine running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    // Stop the loops first so nothing restarts workers mid-drain
    tracing::info!("Shutting down");
    shutdown.cancel();
    supervisor.stop_all().await;
    registry.mark_offline().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
