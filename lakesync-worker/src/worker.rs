//! Worker lifecycle controller.
//!
//! Assembles the worker's collaborators in dependency order, registers the
//! workflows and activities with the engine, and drives the engine's run loop
//! until shutdown is requested.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::activities::Activities;
use crate::config::WorkerServiceConfig;
use crate::engine::http::HttpEngineConnector;
use crate::engine::{
    ConnectOptions, EngineConnector, EngineError, EngineWorker, WorkerOptions, WorkflowKind,
};
use crate::health::{HealthServer, HealthState};
use crate::pods::{KubePodManager, PodManager, PodManagerError};
use crate::scheduling::sanitize_job_mapping;
use crate::store::{JobStore, PostgresJobStore, StoreError};

/// Namespace prefix qualifying worker identities on the engine.
pub const WORKER_IDENTITY_PREFIX: &str = "lakesync.io/k8s-workers";

/// Fixed port of the worker's health endpoint.
pub const HEALTH_PORT: u16 = 8090;

/// Errors raised while assembling the worker's collaborators.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The job store could not be reached.
    #[error("failed to connect to the job store: {0}")]
    Store(#[from] StoreError),
    /// The pod manager could not be created.
    #[error("failed to create the pod manager: {0}")]
    PodManager(#[from] PodManagerError),
    /// The workflow engine rejected the connection.
    #[error("failed to connect to the workflow engine: {0}")]
    Engine(#[from] EngineError),
}

/// Errors raised while the worker is running.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The engine's run loop failed.
    #[error("the workflow engine worker failed: {0}")]
    Engine(#[from] EngineError),
}

/// Opens the job store connection.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, config: &WorkerServiceConfig)
    -> Result<Arc<dyn JobStore>, StoreError>;
}

/// Creates the pod manager.
#[async_trait]
pub trait PodConnector: Send + Sync {
    async fn connect(
        &self,
        config: &WorkerServiceConfig,
    ) -> Result<Arc<dyn PodManager>, PodManagerError>;
}

/// The set of connectors a [`PipelineWorker`] is built from.
///
/// Production wiring comes from [`Connectors::production`]; tests substitute
/// mock connectors to observe the build sequence without external systems.
pub struct Connectors {
    pub store: Box<dyn StoreConnector>,
    pub pods: Box<dyn PodConnector>,
    pub engine: Box<dyn EngineConnector>,
}

impl Connectors {
    /// Connectors backed by Postgres, the ambient Kubernetes cluster, and the
    /// HTTP engine client.
    pub fn production() -> Connectors {
        Connectors {
            store: Box::new(PostgresStoreConnector),
            pods: Box::new(KubePodConnector),
            engine: Box::new(HttpEngineConnector::new()),
        }
    }
}

struct PostgresStoreConnector;

#[async_trait]
impl StoreConnector for PostgresStoreConnector {
    async fn connect(
        &self,
        config: &WorkerServiceConfig,
    ) -> Result<Arc<dyn JobStore>, StoreError> {
        let store = PostgresJobStore::connect(&config.database).await?;

        Ok(Arc::new(store))
    }
}

struct KubePodConnector;

#[async_trait]
impl PodConnector for KubePodConnector {
    async fn connect(
        &self,
        config: &WorkerServiceConfig,
    ) -> Result<Arc<dyn PodManager>, PodManagerError> {
        let pods = KubePodManager::new(&config.kubernetes).await?;

        Ok(Arc::new(pods))
    }
}

/// A fully assembled pipeline worker, ready to run.
pub struct PipelineWorker {
    engine_worker: Box<dyn EngineWorker>,
    health: HealthServer,
    identity: String,
    started_at: Instant,
}

impl PipelineWorker {
    /// Assembles a worker from the configuration and the given connectors.
    ///
    /// The node-affinity mapping is sanitized up front so that every rejected
    /// entry is reported once at startup, before any activity can consult the
    /// routing table. Collaborators are connected in dependency order and the
    /// first failure aborts the build.
    pub async fn build(
        config: Arc<WorkerServiceConfig>,
        connectors: Connectors,
    ) -> Result<PipelineWorker, BuildError> {
        let started_at = Instant::now();

        let outcome = sanitize_job_mapping(&config.kubernetes.job_mapping);
        outcome.log_rejections();
        for (job_id, labels) in outcome.routing.iter() {
            info!(job_id = *job_id, ?labels, "job routing entry");
        }
        info!(
            routed_jobs = outcome.routing.len(),
            rejected_entries = outcome.rejections.len(),
            "sanitized node-affinity mapping"
        );

        let identity = format!(
            "{WORKER_IDENTITY_PREFIX}/{}",
            config.worker.worker_identity
        );

        let store = connectors.store.connect(&config).await?;
        let pods = connectors.pods.connect(&config).await?;

        let client = connectors
            .engine
            .connect(ConnectOptions {
                address: config.engine.address.clone(),
            })
            .await?;

        let mut engine_worker = client.create_worker(WorkerOptions {
            task_queue: config.engine.task_queue.clone(),
            identity: identity.clone(),
            max_concurrent_activities: config.worker.max_concurrent_activities,
            max_concurrent_workflows: config.worker.max_concurrent_workflows,
        });

        engine_worker.register_workflow(WorkflowKind::DiscoverCatalog);
        engine_worker.register_workflow(WorkflowKind::TestConnection);
        engine_worker.register_workflow(WorkflowKind::RunSync);

        let activities = Arc::new(Activities::new(
            store.clone(),
            pods.clone(),
            config.clone(),
            outcome.routing,
        ));
        engine_worker.register_activities(activities);

        let health = HealthServer::new(HealthState::new(started_at, store, pods), HEALTH_PORT);

        info!(identity = %identity, task_queue = %config.engine.task_queue, "worker assembled");

        Ok(PipelineWorker {
            engine_worker,
            health,
            identity,
            started_at,
        })
    }

    /// Runs the worker until `shutdown` is cancelled or the engine fails.
    ///
    /// The health endpoint runs alongside the engine loop; a health serve
    /// failure is logged and the worker keeps running without it.
    pub async fn start(mut self, shutdown: CancellationToken) -> Result<(), WorkerError> {
        info!(identity = %self.identity, "starting worker");

        let health_shutdown = shutdown.child_token();
        let health_handle = {
            let token = health_shutdown.clone();
            let health = self.health;
            tokio::spawn(async move {
                if let Err(err) = health.serve(token).await {
                    error!("health endpoint failed: {err}");
                }
            })
        };

        let result = self.engine_worker.run(shutdown).await;

        health_shutdown.cancel();
        let _ = health_handle.await;

        info!(
            identity = %self.identity,
            uptime_seconds = self.started_at.elapsed().as_secs(),
            "worker stopped"
        );

        result.map_err(WorkerError::Engine)
    }

    /// How long this worker has existed since [`PipelineWorker::build`].
    pub fn uptime(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}
