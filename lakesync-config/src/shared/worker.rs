use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Default worker identity when none is configured.
const DEFAULT_WORKER_IDENTITY: &str = "lakesync-worker";

/// Default maximum number of concurrently executing activities.
const DEFAULT_MAX_CONCURRENT_ACTIVITIES: usize = 10;

/// Default maximum number of concurrently executing workflow tasks.
const DEFAULT_MAX_CONCURRENT_WORKFLOWS: usize = 5;

/// Identity and concurrency settings for the worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerSettings {
    /// Identity string reported to the workflow engine.
    ///
    /// The worker prefixes this with a fixed namespace at startup, so the
    /// configured value only needs to distinguish deployments.
    #[serde(default = "default_worker_identity")]
    pub worker_identity: String,
    /// Maximum number of activities executing at the same time.
    #[serde(default = "default_max_concurrent_activities")]
    pub max_concurrent_activities: usize,
    /// Maximum number of workflow tasks executing at the same time.
    #[serde(default = "default_max_concurrent_workflows")]
    pub max_concurrent_workflows: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            worker_identity: default_worker_identity(),
            max_concurrent_activities: default_max_concurrent_activities(),
            max_concurrent_workflows: default_max_concurrent_workflows(),
        }
    }
}

impl WorkerSettings {
    /// Validates the worker settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_concurrent_activities == 0 {
            return Err(ValidationError::MaxConcurrentActivitiesZero);
        }
        if self.max_concurrent_workflows == 0 {
            return Err(ValidationError::MaxConcurrentWorkflowsZero);
        }

        Ok(())
    }
}

fn default_worker_identity() -> String {
    DEFAULT_WORKER_IDENTITY.to_string()
}

fn default_max_concurrent_activities() -> usize {
    DEFAULT_MAX_CONCURRENT_ACTIVITIES
}

fn default_max_concurrent_workflows() -> usize {
    DEFAULT_MAX_CONCURRENT_WORKFLOWS
}
