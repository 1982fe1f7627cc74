//! Static HTML page.

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::error::AppError;
use crate::ServerState;

/// Serves the configured HTML file byte for byte, read fresh on every request.
pub async fn index(State(state): State<Arc<ServerState>>) -> Result<Response, AppError> {
    let path = &state.settings.static_index;
    let html = tokio::fs::read(path).await.map_err(|e| {
        error!("Failed to read {}: {}", path.display(), e);
        AppError::Internal(format!("Failed to load page: {}", e))
    })?;

    Ok(([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html).into_response())
}
