use serde::Deserialize;

use lakesync_config::shared::{
    EngineConfig, KubernetesConfig, PgConnectionConfig, TimeoutsConfig, ValidationError,
    WorkerSettings,
};
use lakesync_config::{Config, load_config};

/// Complete configuration for the worker service.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerServiceConfig {
    /// Workflow engine endpoint and task queue.
    pub engine: EngineConfig,
    /// Worker identity and concurrency limits.
    #[serde(default)]
    pub worker: WorkerSettings,
    /// Cluster settings and the raw node-affinity mapping.
    pub kubernetes: KubernetesConfig,
    /// Job database connection.
    pub database: PgConnectionConfig,
    /// Per-operation activity timeout overrides.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

impl Config for WorkerServiceConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

impl WorkerServiceConfig {
    /// Validates the configuration sections that must be correct for the
    /// worker to start.
    ///
    /// The node-affinity mapping is exempt: its entries are sanitized
    /// individually at construction so that a bad entry degrades to a
    /// warning instead of a startup failure.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.engine.validate()?;
        self.worker.validate()?;
        self.kubernetes.validate()?;
        self.database.tls.validate()?;

        Ok(())
    }
}

/// Loads the [`WorkerServiceConfig`] and validates it.
pub fn load_worker_config() -> anyhow::Result<WorkerServiceConfig> {
    let config = load_config::<WorkerServiceConfig>()?;
    config.validate()?;

    Ok(config)
}
