use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Default namespace job workloads are scheduled into.
const DEFAULT_NAMESPACE: &str = "lakesync";

/// Raw node-affinity mapping as it appears in configuration.
///
/// Keys are stringified job ids; YAML integer keys arrive as strings through
/// the configuration layer. A job may map to `null`, which the validator
/// treats as an invalid entry.
pub type RawJobMapping = HashMap<String, Option<HashMap<String, String>>>;

/// Kubernetes-facing settings for the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct KubernetesConfig {
    /// Namespace job workloads run in.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Container image used for job workloads.
    pub job_image: String,
    /// Mapping from job id to the node labels its workloads must land on.
    ///
    /// Entries are validated at worker startup; invalid entries are dropped
    /// with a warning rather than aborting the process.
    #[serde(default)]
    pub job_mapping: RawJobMapping,
}

impl KubernetesConfig {
    /// Validates the Kubernetes settings.
    ///
    /// The job mapping is deliberately not validated here: its entries are
    /// sanitized individually at worker construction so that one bad entry
    /// cannot prevent startup.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.job_image.trim().is_empty() {
            return Err(ValidationError::MissingJobImage);
        }

        Ok(())
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}
