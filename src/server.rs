//! Minimal HTTP surface of the hosting server: a health endpoint that
//! reports synchronizer state and counters.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::sync::{MetricsReport, SyncState, Synchronizer};

#[derive(Clone)]
pub struct AppState {
    pub synchronizer: Arc<Synchronizer>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub synchronizer: SyncState,
    pub metrics: MetricsReport,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The server is healthy whether or not the synchronizer is; its state is
/// reported for information only.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        synchronizer: state.synchronizer.state(),
        metrics: state.synchronizer.metrics().report(),
    })
}
