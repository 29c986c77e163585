//! Health, readiness, and metrics HTTP endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;

use crate::AppState;

pub fn health_router(state: Arc<AppState>) -> Router {
    Router::new().route("/health", get(health)).route("/ready", get(ready)).route("/metrics", get(metrics)).with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "ts": Utc::now() }))
}

async fn ready(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, StatusCode> {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => Ok(Json(json!({ "ok": true, "ts": Utc::now() }))),
        Err(_) => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.encode()
}
