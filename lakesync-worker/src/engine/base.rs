use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::activities::Activities;
use crate::timeouts::Operation;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors emitted by the workflow-engine integration.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Connecting to the engine frontend failed.
    #[error("failed to connect to the workflow engine at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: BoxError,
    },
    /// Registering the worker with the engine failed.
    #[error("failed to register the worker with the engine: {0}")]
    Register(#[source] BoxError),
    /// The run loop failed for a reason other than shutdown.
    #[error("the engine run loop failed: {0}")]
    Run(#[source] BoxError),
}

/// The workflow types this worker hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    DiscoverCatalog,
    TestConnection,
    RunSync,
}

impl WorkflowKind {
    /// Returns the workflow type name registered with the engine.
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowKind::DiscoverCatalog => "discover-catalog",
            WorkflowKind::TestConnection => "test-connection",
            WorkflowKind::RunSync => "run-sync",
        }
    }

    /// Returns the activity operation backing this workflow.
    pub fn operation(&self) -> Operation {
        match self {
            WorkflowKind::DiscoverCatalog => Operation::DiscoverCatalog,
            WorkflowKind::TestConnection => Operation::TestConnection,
            WorkflowKind::RunSync => Operation::RunSync,
        }
    }
}

/// Options for opening a connection to the engine.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Address of the engine frontend.
    pub address: String,
}

/// Options for creating a worker on an engine client.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// The single task queue the worker polls.
    pub task_queue: String,
    /// Fully-qualified worker identity.
    pub identity: String,
    /// Maximum number of activities executing concurrently.
    pub max_concurrent_activities: usize,
    /// Maximum number of workflow tasks executing concurrently.
    pub max_concurrent_workflows: usize,
}

/// Opens engine clients. The production connector dials the configured
/// address; tests substitute connectors that record or fail.
#[async_trait]
pub trait EngineConnector: Send + Sync {
    /// Connects to the engine, verifying it is reachable.
    async fn connect(&self, options: ConnectOptions) -> Result<Box<dyn EngineClient>, EngineError>;
}

/// A live connection to the workflow engine.
pub trait EngineClient: Send + Sync {
    /// Creates a worker bound to exactly one task queue.
    fn create_worker(&self, options: WorkerOptions) -> Box<dyn EngineWorker>;
}

/// A worker registered on one task queue of the engine.
#[async_trait]
pub trait EngineWorker: Send {
    /// Registers a workflow type hosted by this worker.
    fn register_workflow(&mut self, kind: WorkflowKind);

    /// Registers the activities instance backing all activity operations.
    fn register_activities(&mut self, activities: Arc<Activities>);

    /// Runs the worker until `shutdown` is cancelled or the engine reports a
    /// fatal error.
    ///
    /// This call blocks the calling task for the lifetime of the worker.
    /// Cancellation-driven shutdown returns `Ok(())`; only engine failures
    /// surface as errors. The loop internally executes polled activities
    /// concurrently up to the configured limits.
    async fn run(&mut self, shutdown: CancellationToken) -> Result<(), EngineError>;
}
