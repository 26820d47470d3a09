use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use harrier_core::{SanitizedConfig, SchedulerStatus};

use crate::metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

#[derive(Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub scheduler: SchedulerStatus,
    pub egress_pool_size: usize,
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        scheduler: state.scheduler_status(),
        egress_pool_size: state.pool_size().await,
    })
}

pub async fn metrics() -> String {
    metrics::encode()
}
