//! Unauthenticated liveness check.

use axum::{Router, response::Json as ResponseJson, routing::get};
use serde::Serialize;
use ts_rs::TS;

use crate::AppState;

#[derive(Debug, Serialize, TS)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

/// GET /api/health
/// Reports the crate version; never touches the database.
pub async fn health() -> ResponseJson<HealthStatus> {
    ResponseJson(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/health", get(health))
}
