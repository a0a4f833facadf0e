use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration for the durable workflow engine this worker serves.
///
/// The worker binds to exactly one task queue. Node affinity is expressed
/// through node labels on the scheduled workloads, not through multiple
/// queues, so a single queue is all the routing surface we need.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Address of the workflow engine frontend, e.g. `http://engine:7233`.
    pub address: String,
    /// Name of the task queue this worker polls.
    pub task_queue: String,
}

impl EngineConfig {
    /// Validates the engine settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.address.trim().is_empty() {
            return Err(ValidationError::MissingEngineAddress);
        }
        if self.task_queue.trim().is_empty() {
            return Err(ValidationError::MissingTaskQueue);
        }

        Ok(())
    }
}
