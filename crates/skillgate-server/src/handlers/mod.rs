//! HTTP route handlers for the gateway.

pub mod agent;
pub mod page;
pub mod skills;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use chrono::{SecondsFormat, Utc};

use crate::dto::{HealthConfig, HealthResponse, NotFoundResponse, AVAILABLE_ENDPOINTS};
use crate::ServerState;

/// Health check endpoint.
pub async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    let config = state
        .settings
        .health_diagnostics
        .then(|| HealthConfig::from_settings(&state.settings));

    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        config,
    })
}

/// Fallback for unknown routes and unsupported methods.
pub async fn not_found() -> (StatusCode, Json<NotFoundResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            error: "Not found",
            available_endpoints: AVAILABLE_ENDPOINTS,
        }),
    )
}
