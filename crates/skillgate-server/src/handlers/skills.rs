//! Skill listing and direct invocation.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::dto::{SkillInfo, SkillsResponse};
use crate::error::AppError;
use crate::ServerState;

/// Lists the registered skills.
pub async fn list(State(state): State<Arc<ServerState>>) -> Json<SkillsResponse> {
    let skills = state
        .tool_registry
        .list()
        .into_iter()
        .map(|schema| SkillInfo {
            name: schema.name,
            description: schema.description,
        })
        .collect();
    Json(SkillsResponse { skills })
}

/// Runs a skill with the request body as its input and returns its content.
///
/// An empty body is treated as `{}`.
pub async fn invoke(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    if !state.tool_registry.has(&name) {
        return Err(AppError::NotFound(format!("Unknown skill: {}", name)));
    }

    let args: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?
    };

    let output = state.tool_registry.execute(&name, args).await?;
    info!("Skill {} invoked (is_error: {})", name, output.is_error);
    Ok(Json(output.content))
}
