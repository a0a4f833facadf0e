use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, EnvVar, Pod, PodSpec};
use kube::Client;
use kube::api::{Api, ObjectMeta, PostParams};
use thiserror::Error;
use tracing::{debug, info};

use lakesync_config::shared::KubernetesConfig;

use crate::timeouts::Operation;

/// How often a launched workload's phase is checked.
const PHASE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Errors emitted by the pod-management integration.
#[derive(Debug, Error)]
pub enum PodManagerError {
    /// An error returned by the [`kube`] client when talking to the API
    /// server.
    #[error("an error occurred with kube when dealing with the cluster: {0}")]
    Kube(#[from] kube::Error),
    /// A serialization error while building workload resources.
    #[error("an error occurred in serde when building a workload: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A simplified view of a pod phase.
///
/// Mirrors the string phases reported by Kubernetes but only tracks the
/// states the worker cares about. Unknown values map to [`PodPhase::Unknown`].
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl From<&str> for PodPhase {
    fn from(value: &str) -> Self {
        match value {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

/// A job workload to be scheduled onto the cluster.
#[derive(Debug, Clone)]
pub struct WorkloadSpec {
    pub job_id: u64,
    pub operation: Operation,
    /// Workflow execution the workload belongs to.
    pub workflow_id: String,
    /// Node labels the workload must be scheduled onto. Empty means no
    /// constraint.
    pub node_selector: BTreeMap<String, String>,
    /// Container image running the workload.
    pub image: String,
    /// Operation payload handed to the container.
    pub payload: serde_json::Value,
}

/// Result of a finished workload.
#[derive(Debug, Clone)]
pub struct WorkloadOutcome {
    pub pod_name: String,
    pub succeeded: bool,
}

/// Handle for creating and observing job workloads on the cluster.
///
/// The worker constructs one at startup, aggregates its health, and drives it
/// from activities. Implementations own all pod lifecycle details.
#[async_trait]
pub trait PodManager: Send + Sync {
    /// Verifies the cluster API is reachable.
    async fn health_check(&self) -> Result<(), PodManagerError>;

    /// Schedules a workload and waits for it to finish.
    ///
    /// Callers bound the wait with their own timeout; this method itself
    /// waits indefinitely.
    async fn run_workload(&self, spec: WorkloadSpec) -> Result<WorkloadOutcome, PodManagerError>;
}

/// [`PodManager`] backed by the [`kube`] client and the ambient cluster
/// configuration (in-cluster or local `~/.kube/config`).
pub struct KubePodManager {
    client: Client,
    namespace: String,
}

impl KubePodManager {
    /// Builds a pod manager from the ambient cluster configuration.
    pub async fn new(config: &KubernetesConfig) -> Result<KubePodManager, PodManagerError> {
        let client = Client::try_default().await?;

        info!(namespace = %config.namespace, "created kubernetes pod manager");

        Ok(KubePodManager {
            client,
            namespace: config.namespace.clone(),
        })
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl PodManager for KubePodManager {
    async fn health_check(&self) -> Result<(), PodManagerError> {
        self.client.apiserver_version().await?;

        Ok(())
    }

    async fn run_workload(&self, spec: WorkloadSpec) -> Result<WorkloadOutcome, PodManagerError> {
        let pod_name = workload_pod_name(&spec);
        let pod = build_workload_pod(&pod_name, &spec)?;

        let pods = self.pods();
        pods.create(&PostParams::default(), &pod).await?;

        info!(
            pod = %pod_name,
            job_id = spec.job_id,
            operation = %spec.operation,
            "created workload pod"
        );

        // Poll the phase until the workload reaches a terminal state. The
        // activity layer wraps this call in the operation's timeout.
        loop {
            tokio::time::sleep(PHASE_POLL_INTERVAL).await;

            let pod = pods.get_status(&pod_name).await?;
            let phase = pod
                .status
                .and_then(|status| status.phase)
                .map(|phase| PodPhase::from(phase.as_str()))
                .unwrap_or(PodPhase::Unknown);

            match phase {
                PodPhase::Succeeded => {
                    return Ok(WorkloadOutcome {
                        pod_name,
                        succeeded: true,
                    });
                }
                PodPhase::Failed => {
                    return Ok(WorkloadOutcome {
                        pod_name,
                        succeeded: false,
                    });
                }
                PodPhase::Pending | PodPhase::Running | PodPhase::Unknown => {
                    debug!(pod = %pod_name, "workload pod still running");
                }
            }
        }
    }
}

/// Derives a DNS-1123 compatible pod name from the workload spec.
fn workload_pod_name(spec: &WorkloadSpec) -> String {
    let suffix: String = spec
        .workflow_id
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .take(24)
        .collect();

    let mut name = format!("lakesync-{}-{}", spec.operation, spec.job_id);
    if !suffix.is_empty() {
        name.push('-');
        name.push_str(&suffix);
    }

    name
}

fn build_workload_pod(pod_name: &str, spec: &WorkloadSpec) -> Result<Pod, PodManagerError> {
    let mut labels = BTreeMap::new();
    labels.insert("app.kubernetes.io/managed-by".to_string(), "lakesync".to_string());
    labels.insert("lakesync.io/job-id".to_string(), spec.job_id.to_string());
    labels.insert(
        "lakesync.io/operation".to_string(),
        spec.operation.as_str().to_string(),
    );

    let payload = serde_json::to_string(&spec.payload)?;

    let node_selector = if spec.node_selector.is_empty() {
        None
    } else {
        Some(spec.node_selector.clone())
    };

    Ok(Pod {
        metadata: ObjectMeta {
            name: Some(pod_name.to_string()),
            labels: Some(labels),
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "job".to_string(),
                image: Some(spec.image.clone()),
                args: Some(vec![spec.operation.as_str().to_string()]),
                env: Some(vec![EnvVar {
                    name: "LAKESYNC_PAYLOAD".to_string(),
                    value: Some(payload),
                    ..EnvVar::default()
                }]),
                ..Container::default()
            }],
            node_selector,
            restart_policy: Some("Never".to_string()),
            ..PodSpec::default()
        }),
        ..Pod::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(workflow_id: &str) -> WorkloadSpec {
        WorkloadSpec {
            job_id: 5,
            operation: Operation::RunSync,
            workflow_id: workflow_id.to_string(),
            node_selector: BTreeMap::new(),
            image: "lakesync/job:latest".to_string(),
            payload: serde_json::json!({}),
        }
    }

    #[test]
    fn pod_names_are_dns_compatible() {
        let name = workload_pod_name(&spec("Sync_Workflow/42!"));

        assert_eq!(name, "lakesync-sync-5-syncworkflow42");
    }

    #[test]
    fn empty_workflow_id_still_yields_a_name() {
        let name = workload_pod_name(&spec(""));

        assert_eq!(name, "lakesync-sync-5");
    }

    #[test]
    fn empty_selector_is_omitted_from_the_pod() {
        let pod = build_workload_pod("p", &spec("w")).unwrap();

        assert!(pod.spec.unwrap().node_selector.is_none());
    }

    #[test]
    fn selector_labels_are_applied_to_the_pod() {
        let mut workload = spec("w");
        workload
            .node_selector
            .insert("zone".to_string(), "us-east".to_string());

        let pod = build_workload_pod("p", &workload).unwrap();

        let selector = pod.spec.unwrap().node_selector.unwrap();
        assert_eq!(selector.get("zone").map(String::as_str), Some("us-east"));
    }
}
