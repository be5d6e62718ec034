//! Liveness and readiness probes.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Live entries in the response cache.
    pub cached: usize,
    /// Keys with a computation in flight.
    pub pending: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        cached: state.cache.len(),
        pending: state.coalescer.len(),
    })
}

/// Ready once at least one template can be served.
pub async fn ready(State(state): State<Arc<AppState>>) -> StatusCode {
    let servable = state
        .settings
        .templates
        .iter()
        .any(|name| state.pipeline.template(name).is_some());
    if servable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
