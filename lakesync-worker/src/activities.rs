use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::WorkerServiceConfig;
use crate::pods::{PodManager, PodManagerError, WorkloadSpec};
use crate::scheduling::SanitizedJobMapping;
use crate::store::JobStore;
use crate::timeouts::{Operation, activity_timeout};

/// Errors surfaced to the workflow engine when an activity fails.
#[derive(Debug, Error)]
pub enum ActivityError {
    /// The workload did not finish within the operation's timeout.
    #[error("the {operation} activity for job {job_id} timed out after {timeout:?}")]
    Timeout {
        operation: Operation,
        job_id: u64,
        timeout: Duration,
    },
    /// The workload pod terminated unsuccessfully.
    #[error("the workload pod '{pod_name}' failed")]
    WorkloadFailed { pod_name: String },
    /// Pod management failed before a terminal pod state was observed.
    #[error("pod management failed: {0}")]
    Pod(#[from] PodManagerError),
}

/// Input to a single activity execution, handed over by the engine worker.
#[derive(Debug, Clone)]
pub struct ActivityRequest {
    pub job_id: u64,
    /// Workflow execution the activity belongs to.
    pub workflow_id: String,
    /// Operation payload forwarded verbatim to the workload.
    pub payload: serde_json::Value,
}

/// The one activities instance behind every registered activity operation.
///
/// Holds the persistence handle, the pod-management handle, the service
/// configuration, and the sanitized routing table. All state is read-only
/// after construction, so the instance is shared freely across concurrent
/// activity executions.
pub struct Activities {
    store: Arc<dyn JobStore>,
    pods: Arc<dyn PodManager>,
    config: Arc<WorkerServiceConfig>,
    routing: SanitizedJobMapping,
}

impl Activities {
    pub fn new(
        store: Arc<dyn JobStore>,
        pods: Arc<dyn PodManager>,
        config: Arc<WorkerServiceConfig>,
        routing: SanitizedJobMapping,
    ) -> Self {
        Self {
            store,
            pods,
            config,
            routing,
        }
    }

    /// Dispatches an activity execution by operation.
    pub async fn execute(
        &self,
        operation: Operation,
        request: ActivityRequest,
    ) -> Result<serde_json::Value, ActivityError> {
        match operation {
            Operation::DiscoverCatalog => self.discover_catalog(request).await,
            Operation::TestConnection => self.test_connection(request).await,
            Operation::RunSync => self.run_sync(request).await,
        }
    }

    /// Discovers the source catalog for a job.
    pub async fn discover_catalog(
        &self,
        request: ActivityRequest,
    ) -> Result<serde_json::Value, ActivityError> {
        self.run_workload(Operation::DiscoverCatalog, request).await
    }

    /// Tests a job's source connection.
    pub async fn test_connection(
        &self,
        request: ActivityRequest,
    ) -> Result<serde_json::Value, ActivityError> {
        self.run_workload(Operation::TestConnection, request).await
    }

    /// Runs a data synchronization for a job.
    pub async fn run_sync(
        &self,
        request: ActivityRequest,
    ) -> Result<serde_json::Value, ActivityError> {
        self.run_workload(Operation::RunSync, request).await
    }

    /// Schedules the workload for one activity and waits for its outcome,
    /// bounded by the operation's resolved timeout.
    async fn run_workload(
        &self,
        operation: Operation,
        request: ActivityRequest,
    ) -> Result<serde_json::Value, ActivityError> {
        let timeout = activity_timeout(operation.as_str(), &self.config.timeouts);

        // A job without a routing entry carries no node constraint and may
        // be scheduled anywhere.
        let node_selector = self
            .routing
            .labels_for(request.job_id)
            .cloned()
            .unwrap_or_default();

        info!(
            operation = %operation,
            job_id = request.job_id,
            workflow_id = %request.workflow_id,
            timeout_secs = timeout.as_secs(),
            "starting activity workload"
        );

        let spec = WorkloadSpec {
            job_id: request.job_id,
            operation,
            workflow_id: request.workflow_id,
            node_selector,
            image: self.config.kubernetes.job_image.clone(),
            payload: request.payload,
        };

        let outcome = match tokio::time::timeout(timeout, self.pods.run_workload(spec)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                self.record(request.job_id, operation, false).await;
                return Err(err.into());
            }
            Err(_elapsed) => {
                self.record(request.job_id, operation, false).await;
                return Err(ActivityError::Timeout {
                    operation,
                    job_id: request.job_id,
                    timeout,
                });
            }
        };

        self.record(request.job_id, operation, outcome.succeeded)
            .await;

        if !outcome.succeeded {
            return Err(ActivityError::WorkloadFailed {
                pod_name: outcome.pod_name,
            });
        }

        Ok(serde_json::json!({
            "job_id": request.job_id,
            "operation": operation.as_str(),
            "pod_name": outcome.pod_name,
        }))
    }

    /// Best-effort activity-run bookkeeping; a store hiccup must not fail an
    /// otherwise successful activity.
    async fn record(&self, job_id: u64, operation: Operation, succeeded: bool) {
        if let Err(err) = self.store.record_activity(job_id, operation, succeeded).await {
            warn!(
                job_id,
                operation = %operation,
                "failed to record activity run: {err}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FailingJobStore, HangingPodManager, RecordingPodManager, test_config_with_sync_timeout,
        test_routing, test_service_config,
    };
    use std::collections::BTreeMap;

    fn request(job_id: u64) -> ActivityRequest {
        ActivityRequest {
            job_id,
            workflow_id: "wf-1".to_string(),
            payload: serde_json::json!({"stream": "orders"}),
        }
    }

    #[tokio::test]
    async fn node_selector_flows_from_the_routing_table() {
        let pods = Arc::new(RecordingPodManager::succeeding());
        let activities = Activities::new(
            Arc::new(FailingJobStore),
            pods.clone(),
            Arc::new(test_service_config()),
            test_routing(&[(5, &[("zone", "us-east")])]),
        );

        activities.run_sync(request(5)).await.unwrap();

        let spec = pods.last_spec().expect("workload was not scheduled");
        let mut expected = BTreeMap::new();
        expected.insert("zone".to_string(), "us-east".to_string());
        assert_eq!(spec.node_selector, expected);
        assert_eq!(spec.operation, Operation::RunSync);
    }

    #[tokio::test]
    async fn unrouted_jobs_get_an_empty_selector() {
        let pods = Arc::new(RecordingPodManager::succeeding());
        let activities = Activities::new(
            Arc::new(FailingJobStore),
            pods.clone(),
            Arc::new(test_service_config()),
            test_routing(&[(5, &[("zone", "us-east")])]),
        );

        activities.discover_catalog(request(42)).await.unwrap();

        let spec = pods.last_spec().expect("workload was not scheduled");
        assert!(spec.node_selector.is_empty());
    }

    #[tokio::test]
    async fn store_failures_do_not_fail_the_activity() {
        let activities = Activities::new(
            Arc::new(FailingJobStore),
            Arc::new(RecordingPodManager::succeeding()),
            Arc::new(test_service_config()),
            test_routing(&[]),
        );

        let result = activities.test_connection(request(1)).await.unwrap();

        assert_eq!(result["operation"], "test");
    }

    #[tokio::test]
    async fn failed_workloads_surface_as_activity_failures() {
        let activities = Activities::new(
            Arc::new(FailingJobStore),
            Arc::new(RecordingPodManager::failing()),
            Arc::new(test_service_config()),
            test_routing(&[]),
        );

        let result = activities.run_sync(request(1)).await;

        assert!(matches!(
            result,
            Err(ActivityError::WorkloadFailed { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_workloads_trip_the_operation_timeout() {
        let activities = Activities::new(
            Arc::new(FailingJobStore),
            Arc::new(HangingPodManager),
            Arc::new(test_config_with_sync_timeout("2")),
            test_routing(&[]),
        );

        let result = activities.run_sync(request(1)).await;

        match result {
            Err(ActivityError::Timeout {
                operation, timeout, ..
            }) => {
                assert_eq!(operation, Operation::RunSync);
                assert_eq!(timeout, Duration::from_secs(2));
            }
            other => panic!("expected a timeout, got {other:?}"),
        }
    }
}
