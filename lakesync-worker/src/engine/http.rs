//! Long-poll HTTP client for the workflow engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::activities::{Activities, ActivityRequest};
use crate::engine::{
    ConnectOptions, EngineClient, EngineConnector, EngineError, EngineWorker, WorkerOptions,
    WorkflowKind,
};
use crate::timeouts::Operation;

/// How long a single poll request is allowed to wait for a task server-side.
const POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Delay before retrying after a failed poll.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Connector for the HTTP engine frontend.
#[derive(Debug, Clone, Default)]
pub struct HttpEngineConnector;

impl HttpEngineConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EngineConnector for HttpEngineConnector {
    async fn connect(&self, options: ConnectOptions) -> Result<Box<dyn EngineClient>, EngineError> {
        let http = reqwest::Client::builder()
            // Poll requests hold the connection open until a task arrives, so
            // the client timeout must exceed the server-side poll timeout.
            .timeout(POLL_TIMEOUT + Duration::from_secs(30))
            .build()
            .map_err(|err| EngineError::Connect {
                address: options.address.clone(),
                source: err.into(),
            })?;

        let health_url = format!("{}/api/v1/health", options.address.trim_end_matches('/'));
        http.get(&health_url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| EngineError::Connect {
                address: options.address.clone(),
                source: err.into(),
            })?;

        info!(address = %options.address, "connected to workflow engine");

        Ok(Box::new(HttpEngineClient {
            http,
            base_url: options.address.trim_end_matches('/').to_string(),
        }))
    }
}

/// A verified connection to the engine frontend.
#[derive(Debug, Clone)]
pub struct HttpEngineClient {
    http: reqwest::Client,
    base_url: String,
}

impl EngineClient for HttpEngineClient {
    fn create_worker(&self, options: WorkerOptions) -> Box<dyn EngineWorker> {
        Box::new(HttpEngineWorker {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            options,
            workflows: Vec::new(),
            activities: None,
        })
    }
}

/// Body announcing this worker to the engine.
#[derive(Debug, Serialize)]
struct WorkerRegistration<'a> {
    identity: &'a str,
    workflows: Vec<&'static str>,
    activities: Vec<&'static str>,
    max_concurrent_activities: usize,
    max_concurrent_workflows: usize,
}

/// A task handed out by the engine in response to a poll.
#[derive(Debug, Clone, Deserialize)]
struct PolledTask {
    task_id: String,
    operation: String,
    job_id: u64,
    workflow_id: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Body reporting the outcome of an executed task.
#[derive(Debug, Serialize)]
struct TaskOutcome {
    succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

/// Worker bound to a single task queue of the HTTP engine.
pub struct HttpEngineWorker {
    http: reqwest::Client,
    base_url: String,
    options: WorkerOptions,
    workflows: Vec<WorkflowKind>,
    activities: Option<Arc<Activities>>,
}

#[async_trait]
impl EngineWorker for HttpEngineWorker {
    fn register_workflow(&mut self, kind: WorkflowKind) {
        if !self.workflows.contains(&kind) {
            self.workflows.push(kind);
        }
    }

    fn register_activities(&mut self, activities: Arc<Activities>) {
        self.activities = Some(activities);
    }

    async fn run(&mut self, shutdown: CancellationToken) -> Result<(), EngineError> {
        let activities = self
            .activities
            .clone()
            .ok_or_else(|| EngineError::Register("no activities registered".into()))?;

        // Announce the worker unless shutdown already happened before the
        // run loop had a chance to start.
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(()),
            registered = self.register() => registered?,
        }

        info!(
            task_queue = %self.options.task_queue,
            identity = %self.options.identity,
            "worker run loop started"
        );

        let limit = self.options.max_concurrent_activities;
        let permits = Arc::new(Semaphore::new(limit));

        loop {
            // A permit is held for the whole poll-execute-report cycle so
            // that at most `limit` activities are in flight.
            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let polled = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                polled = self.poll_task() => polled,
            };

            match polled {
                Ok(Some(task)) => {
                    let http = self.http.clone();
                    let base_url = self.base_url.clone();
                    let activities = activities.clone();

                    tokio::spawn(async move {
                        let _permit = permit;
                        execute_task(http, base_url, activities, task).await;
                    });
                }
                Ok(None) => {
                    // Empty poll; the queue had nothing for us within the
                    // poll window.
                    drop(permit);
                }
                Err(err) => {
                    drop(permit);
                    warn!("failed to poll the task queue: {err}");

                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                    }
                }
            }
        }

        // Wait for in-flight activities to finish before returning, so a
        // shutdown never abandons a running task silently.
        let _draining = permits.acquire_many(limit as u32).await;

        info!("worker run loop stopped");

        Ok(())
    }
}

impl HttpEngineWorker {
    async fn register(&self) -> Result<(), EngineError> {
        let registration = WorkerRegistration {
            identity: &self.options.identity,
            workflows: self.workflows.iter().map(WorkflowKind::name).collect(),
            activities: self
                .workflows
                .iter()
                .map(|kind| kind.operation().as_str())
                .collect(),
            max_concurrent_activities: self.options.max_concurrent_activities,
            max_concurrent_workflows: self.options.max_concurrent_workflows,
        };

        let url = format!(
            "{}/api/v1/task-queues/{}/workers",
            self.base_url, self.options.task_queue
        );
        self.http
            .post(&url)
            .json(&registration)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| EngineError::Register(err.into()))?;

        Ok(())
    }

    /// Long-polls the task queue for one task. Returns `Ok(None)` when the
    /// poll window elapsed without work.
    async fn poll_task(&self) -> Result<Option<PolledTask>, EngineError> {
        let url = format!(
            "{}/api/v1/task-queues/{}/poll",
            self.base_url, self.options.task_queue
        );

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "identity": self.options.identity }))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| EngineError::Run(err.into()))?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let task = response
            .json::<PolledTask>()
            .await
            .map_err(|err| EngineError::Run(err.into()))?;

        Ok(Some(task))
    }
}

/// Executes one polled task and reports its outcome back to the engine.
async fn execute_task(
    http: reqwest::Client,
    base_url: String,
    activities: Arc<Activities>,
    task: PolledTask,
) {
    debug!(
        task_id = %task.task_id,
        operation = %task.operation,
        job_id = task.job_id,
        "executing task"
    );

    let outcome = match Operation::parse(&task.operation) {
        Some(operation) => {
            let request = ActivityRequest {
                job_id: task.job_id,
                workflow_id: task.workflow_id.clone(),
                payload: task.payload.clone(),
            };

            match activities.execute(operation, request).await {
                Ok(result) => TaskOutcome {
                    succeeded: true,
                    result: Some(result),
                    failure: None,
                },
                Err(err) => TaskOutcome {
                    succeeded: false,
                    result: None,
                    failure: Some(err.to_string()),
                },
            }
        }
        None => TaskOutcome {
            succeeded: false,
            result: None,
            failure: Some(format!("unknown operation '{}'", task.operation)),
        },
    };

    let url = format!("{base_url}/api/v1/tasks/{}/outcome", task.task_id);
    let report = http
        .post(&url)
        .json(&outcome)
        .send()
        .await
        .and_then(|response| response.error_for_status());

    if let Err(err) = report {
        // The engine will time the task out and reschedule it; nothing else
        // we can do from here.
        warn!(task_id = %task.task_id, "failed to report task outcome: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_activities, test_worker_options};

    fn test_worker() -> HttpEngineWorker {
        HttpEngineWorker {
            http: reqwest::Client::new(),
            base_url: "http://127.0.0.1:9".to_string(),
            options: test_worker_options(),
            workflows: Vec::new(),
            activities: None,
        }
    }

    #[test]
    fn workflow_registration_is_deduplicated() {
        let mut worker = test_worker();

        worker.register_workflow(WorkflowKind::DiscoverCatalog);
        worker.register_workflow(WorkflowKind::RunSync);
        worker.register_workflow(WorkflowKind::DiscoverCatalog);

        assert_eq!(
            worker.workflows,
            vec![WorkflowKind::DiscoverCatalog, WorkflowKind::RunSync]
        );
    }

    #[tokio::test]
    async fn run_without_activities_is_a_registration_error() {
        let mut worker = test_worker();

        let result = worker.run(CancellationToken::new()).await;

        assert!(matches!(result, Err(EngineError::Register(_))));
    }

    #[tokio::test]
    async fn run_exits_cleanly_when_already_cancelled() {
        let mut worker = test_worker();
        worker.register_workflow(WorkflowKind::DiscoverCatalog);
        worker.register_activities(test_activities());

        let shutdown = CancellationToken::new();
        shutdown.cancel();

        // The engine address is unreachable; cancellation must win before
        // any network activity is attempted.
        worker.run(shutdown).await.unwrap();
    }
}
