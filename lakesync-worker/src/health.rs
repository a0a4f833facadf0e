use std::sync::Arc;
use tokio::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::pods::PodManager;
use crate::store::JobStore;

/// Read-only view of the worker shared with the health endpoint.
pub struct HealthState {
    started_at: Instant,
    store: Arc<dyn JobStore>,
    pods: Arc<dyn PodManager>,
}

impl HealthState {
    pub fn new(started_at: Instant, store: Arc<dyn JobStore>, pods: Arc<dyn PodManager>) -> Self {
        Self {
            started_at,
            store,
            pods,
        }
    }
}

/// Body returned by the health endpoint.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
    database: String,
    pod_manager: String,
}

/// Health endpoint for operators, served on a fixed local port.
///
/// Reports the worker's uptime and passes through the health of the
/// persistence and pod-management collaborators; what "healthy" means is up
/// to them, this endpoint only aggregates.
pub struct HealthServer {
    state: Arc<HealthState>,
    port: u16,
}

impl HealthServer {
    pub fn new(state: HealthState, port: u16) -> Self {
        Self {
            state: Arc::new(state),
            port,
        }
    }

    /// Serves the endpoint until `shutdown` is cancelled.
    ///
    /// A cancellation-driven exit is a clean return; only bind and serve
    /// failures surface as errors, and the caller decides whether they are
    /// fatal (they are not: a worker without a health endpoint still works).
    pub async fn serve(self, shutdown: CancellationToken) -> std::io::Result<()> {
        let router = Router::new()
            .route("/health", get(health))
            .with_state(self.state);

        let listener = TcpListener::bind(("0.0.0.0", self.port)).await?;
        info!(port = self.port, "health endpoint listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
    }
}

async fn health(State(state): State<Arc<HealthState>>) -> (StatusCode, Json<HealthResponse>) {
    let database = match state.store.health_check().await {
        Ok(()) => "healthy".to_string(),
        Err(err) => format!("unhealthy: {err}"),
    };
    let pod_manager = match state.pods.health_check().await {
        Ok(()) => "healthy".to_string(),
        Err(err) => format!("unhealthy: {err}"),
    };

    let all_healthy = database == "healthy" && pod_manager == "healthy";
    let (status, code) = if all_healthy {
        ("ok", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    let response = HealthResponse {
        status,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        database,
        pod_manager,
    };

    (code, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FailingJobStore, HealthyJobStore, RecordingPodManager, UnreachablePodManager,
    };

    fn state(store: Arc<dyn JobStore>, pods: Arc<dyn PodManager>) -> Arc<HealthState> {
        Arc::new(HealthState::new(Instant::now(), store, pods))
    }

    #[tokio::test]
    async fn healthy_collaborators_report_ok() {
        let state = state(
            Arc::new(HealthyJobStore),
            Arc::new(RecordingPodManager::succeeding()),
        );

        let (code, Json(response)) = health(State(state)).await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(response.status, "ok");
        assert_eq!(response.database, "healthy");
        assert_eq!(response.pod_manager, "healthy");
    }

    #[tokio::test]
    async fn unhealthy_store_degrades_the_worker() {
        let state = state(
            Arc::new(FailingJobStore),
            Arc::new(RecordingPodManager::succeeding()),
        );

        let (code, Json(response)) = health(State(state)).await;

        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.status, "degraded");
        assert!(response.database.starts_with("unhealthy"));
        assert_eq!(response.pod_manager, "healthy");
    }

    #[tokio::test]
    async fn unreachable_cluster_degrades_the_worker() {
        let state = state(Arc::new(HealthyJobStore), Arc::new(UnreachablePodManager));

        let (code, Json(response)) = health(State(state)).await;

        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.pod_manager.starts_with("unhealthy"));
    }

    #[tokio::test(start_paused = true)]
    async fn uptime_tracks_the_start_instant() {
        let state = state(
            Arc::new(HealthyJobStore),
            Arc::new(RecordingPodManager::succeeding()),
        );

        tokio::time::advance(std::time::Duration::from_secs(90)).await;

        let (_, Json(response)) = health(State(state.clone())).await;

        assert!(response.uptime_seconds >= 90);
    }
}
