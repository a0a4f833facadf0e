//! Shared mock collaborators for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use lakesync_config::shared::{
    EngineConfig, KubernetesConfig, PgConnectionConfig, RawJobMapping, TimeoutsConfig, TlsConfig,
    WorkerSettings,
};

use crate::activities::Activities;
use crate::config::WorkerServiceConfig;
use crate::engine::{
    ConnectOptions, EngineClient, EngineConnector, EngineError, EngineWorker, WorkerOptions,
    WorkflowKind,
};
use crate::pods::{PodManager, PodManagerError, WorkloadOutcome, WorkloadSpec};
use crate::scheduling::{SanitizedJobMapping, sanitize_job_mapping};
use crate::store::{JobStore, StoreError};
use crate::timeouts::Operation;

pub fn test_service_config() -> WorkerServiceConfig {
    WorkerServiceConfig {
        engine: EngineConfig {
            address: "http://127.0.0.1:9".to_string(),
            task_queue: "lakesync-jobs".to_string(),
        },
        worker: WorkerSettings::default(),
        kubernetes: KubernetesConfig {
            namespace: "lakesync".to_string(),
            job_image: "lakesync/job:latest".to_string(),
            job_mapping: RawJobMapping::new(),
        },
        database: PgConnectionConfig {
            host: "localhost".to_string(),
            port: 5432,
            name: "lakesync".to_string(),
            username: "postgres".to_string(),
            password: None,
            tls: TlsConfig {
                trusted_root_certs: String::new(),
                enabled: false,
            },
        },
        timeouts: TimeoutsConfig::default(),
    }
}

pub fn test_config_with_sync_timeout(raw: &str) -> WorkerServiceConfig {
    let mut config = test_service_config();
    config.timeouts.activity.sync = Some(raw.to_string());

    config
}

/// Builds a sanitized routing table from literal entries.
pub fn test_routing(entries: &[(u64, &[(&str, &str)])]) -> SanitizedJobMapping {
    let raw: RawJobMapping = entries
        .iter()
        .map(|(job_id, labels)| {
            (
                job_id.to_string(),
                Some(
                    labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
            )
        })
        .collect();

    let outcome = sanitize_job_mapping(&raw);
    assert!(outcome.rejections.is_empty(), "test routing must be valid");

    outcome.routing
}

pub fn test_worker_options() -> WorkerOptions {
    WorkerOptions {
        task_queue: "lakesync-jobs".to_string(),
        identity: "lakesync.io/k8s-workers/test-worker".to_string(),
        max_concurrent_activities: 2,
        max_concurrent_workflows: 2,
    }
}

pub fn test_activities() -> Arc<Activities> {
    Arc::new(Activities::new(
        Arc::new(HealthyJobStore),
        Arc::new(RecordingPodManager::succeeding()),
        Arc::new(test_service_config()),
        SanitizedJobMapping::default(),
    ))
}

fn mock_kube_error() -> PodManagerError {
    PodManagerError::Kube(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: "cluster unreachable".to_string(),
        reason: "TestFailure".to_string(),
        code: 500,
    }))
}

/// Store whose every operation succeeds.
pub struct HealthyJobStore;

#[async_trait]
impl JobStore for HealthyJobStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn record_activity(
        &self,
        _job_id: u64,
        _operation: Operation,
        _succeeded: bool,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Store whose every operation fails.
pub struct FailingJobStore;

#[async_trait]
impl JobStore for FailingJobStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }

    async fn record_activity(
        &self,
        _job_id: u64,
        _operation: Operation,
        _succeeded: bool,
    ) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }
}

/// Pod manager that records the last scheduled workload and finishes it with
/// a fixed outcome.
pub struct RecordingPodManager {
    succeeds: bool,
    last_spec: Mutex<Option<WorkloadSpec>>,
}

impl RecordingPodManager {
    pub fn succeeding() -> Self {
        Self {
            succeeds: true,
            last_spec: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            succeeds: false,
            last_spec: Mutex::new(None),
        }
    }

    pub fn last_spec(&self) -> Option<WorkloadSpec> {
        self.last_spec.lock().unwrap().clone()
    }
}

#[async_trait]
impl PodManager for RecordingPodManager {
    async fn health_check(&self) -> Result<(), PodManagerError> {
        Ok(())
    }

    async fn run_workload(&self, spec: WorkloadSpec) -> Result<WorkloadOutcome, PodManagerError> {
        let pod_name = format!("mock-{}-{}", spec.operation, spec.job_id);
        *self.last_spec.lock().unwrap() = Some(spec);

        Ok(WorkloadOutcome {
            pod_name,
            succeeded: self.succeeds,
        })
    }
}

/// Pod manager whose workloads never finish.
pub struct HangingPodManager;

#[async_trait]
impl PodManager for HangingPodManager {
    async fn health_check(&self) -> Result<(), PodManagerError> {
        Ok(())
    }

    async fn run_workload(&self, _spec: WorkloadSpec) -> Result<WorkloadOutcome, PodManagerError> {
        std::future::pending().await
    }
}

/// Pod manager whose cluster is unreachable.
pub struct UnreachablePodManager;

#[async_trait]
impl PodManager for UnreachablePodManager {
    async fn health_check(&self) -> Result<(), PodManagerError> {
        Err(mock_kube_error())
    }

    async fn run_workload(&self, _spec: WorkloadSpec) -> Result<WorkloadOutcome, PodManagerError> {
        Err(mock_kube_error())
    }
}

/// Observations recorded by the mock engine stack during a worker build.
#[derive(Default)]
pub struct EngineProbe {
    pub connects: AtomicUsize,
    pub fail_run: std::sync::atomic::AtomicBool,
    pub state: Mutex<EngineProbeState>,
}

#[derive(Default)]
pub struct EngineProbeState {
    pub connect_address: Option<String>,
    pub worker_options: Option<WorkerOptions>,
    pub workflows: Vec<WorkflowKind>,
    pub activities_registered: bool,
}

/// Connector that records every interaction instead of talking to a real
/// engine. Its worker's run loop waits for cancellation, or fails when
/// `fail_run` is set on the probe.
pub struct RecordingEngineConnector {
    pub probe: Arc<EngineProbe>,
}

#[async_trait]
impl EngineConnector for RecordingEngineConnector {
    async fn connect(&self, options: ConnectOptions) -> Result<Box<dyn EngineClient>, EngineError> {
        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        self.probe.state.lock().unwrap().connect_address = Some(options.address);

        Ok(Box::new(RecordingEngineClient {
            probe: self.probe.clone(),
        }))
    }
}

struct RecordingEngineClient {
    probe: Arc<EngineProbe>,
}

impl EngineClient for RecordingEngineClient {
    fn create_worker(&self, options: WorkerOptions) -> Box<dyn EngineWorker> {
        self.probe.state.lock().unwrap().worker_options = Some(options);

        Box::new(RecordingEngineWorker {
            probe: self.probe.clone(),
        })
    }
}

struct RecordingEngineWorker {
    probe: Arc<EngineProbe>,
}

#[async_trait]
impl EngineWorker for RecordingEngineWorker {
    fn register_workflow(&mut self, kind: WorkflowKind) {
        self.probe.state.lock().unwrap().workflows.push(kind);
    }

    fn register_activities(&mut self, _activities: Arc<Activities>) {
        self.probe.state.lock().unwrap().activities_registered = true;
    }

    async fn run(&mut self, shutdown: CancellationToken) -> Result<(), EngineError> {
        if self.probe.fail_run.load(Ordering::SeqCst) {
            return Err(EngineError::Run("engine exploded".into()));
        }

        shutdown.cancelled().await;

        Ok(())
    }
}

/// Connector that refuses every connection attempt.
pub struct FailingEngineConnector;

#[async_trait]
impl EngineConnector for FailingEngineConnector {
    async fn connect(&self, options: ConnectOptions) -> Result<Box<dyn EngineClient>, EngineError> {
        Err(EngineError::Connect {
            address: options.address,
            source: "connection refused".into(),
        })
    }
}
