// src/handlers/health.rs

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

use crate::clock::Clock;

/// Liveness probe.
pub async fn health_check(State(clock): State<Arc<dyn Clock>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": clock.now().to_rfc3339(),
    }))
}
