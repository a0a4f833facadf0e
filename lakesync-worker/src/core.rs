//! Service entry point wiring configuration, signals, and the worker.

use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use lakesync_config::shared::{EngineConfig, KubernetesConfig, PgConnectionConfig, WorkerSettings};

use crate::config::WorkerServiceConfig;
use crate::worker::{Connectors, PipelineWorker};

/// Starts the worker service with the provided configuration.
///
/// Assembles the worker against the production connectors and runs it until
/// a shutdown signal arrives or the engine loop fails.
pub async fn start_worker(config: WorkerServiceConfig) -> anyhow::Result<()> {
    info!("starting worker service");

    log_config(&config);

    let config = Arc::new(config);
    let worker = PipelineWorker::build(config, Connectors::production()).await?;

    let shutdown = CancellationToken::new();

    // Listen for SIGTERM, sent by Kubernetes before SIGKILL during pod
    // termination, alongside SIGINT for local runs.
    let signal_handle = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("SIGINT (Ctrl+C) received, shutting down worker");
                }
                _ = sigterm.recv() => {
                    info!("SIGTERM received, shutting down worker");
                }
            }

            shutdown.cancel();
        }
    });

    let result = worker.start(shutdown).await;

    // If the worker stopped on its own, the signal listener is still pending.
    signal_handle.abort();
    let _ = signal_handle.await;

    result?;

    info!("worker service completed");

    Ok(())
}

fn log_config(config: &WorkerServiceConfig) {
    log_engine_config(&config.engine);
    log_worker_settings(&config.worker);
    log_kubernetes_config(&config.kubernetes);
    log_pg_connection_config(&config.database);
}

fn log_engine_config(config: &EngineConfig) {
    debug!(
        address = config.address,
        task_queue = config.task_queue,
        "engine config"
    );
}

fn log_worker_settings(config: &WorkerSettings) {
    debug!(
        worker_identity = config.worker_identity,
        max_concurrent_activities = config.max_concurrent_activities,
        max_concurrent_workflows = config.max_concurrent_workflows,
        "worker settings"
    );
}

fn log_kubernetes_config(config: &KubernetesConfig) {
    debug!(
        namespace = config.namespace,
        job_image = config.job_image,
        job_mapping_entries = config.job_mapping.len(),
        "kubernetes config"
    );
}

fn log_pg_connection_config(config: &PgConnectionConfig) {
    debug!(
        host = config.host,
        port = config.port,
        dbname = config.name,
        username = config.username,
        tls_enabled = config.tls.enabled,
        "job database connection config",
    );
}
