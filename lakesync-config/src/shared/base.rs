use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    /// The workflow engine address is empty.
    #[error("`engine.address` cannot be empty")]
    MissingEngineAddress,
    /// The task queue name is empty.
    #[error("`engine.task_queue` cannot be empty")]
    MissingTaskQueue,
    /// The activity concurrency limit is zero.
    #[error("`worker.max_concurrent_activities` cannot be zero")]
    MaxConcurrentActivitiesZero,
    /// The workflow task concurrency limit is zero.
    #[error("`worker.max_concurrent_workflows` cannot be zero")]
    MaxConcurrentWorkflowsZero,
    /// The image used for job workloads is empty.
    #[error("`kubernetes.job_image` cannot be empty")]
    MissingJobImage,
}
