use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::startup::AppState;

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to Pantry API!" }))
}

/// Liveness probe.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": state.config.service_name,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness probe: the pantry store must answer.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Pantry store readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
