//! Remaining provider quota.

use crate::state::AppState;
use axum::{Json, extract::State};
use metrica_core::ratelimit::RateLimitSnapshot;
use std::sync::Arc;

/// Latest quota snapshot; zeroed when tracking is disabled.
pub async fn remaining(State(state): State<Arc<AppState>>) -> Json<RateLimitSnapshot> {
    Json(
        state
            .tracker
            .as_ref()
            .map(|tracker| tracker.snapshot())
            .unwrap_or_default(),
    )
}
