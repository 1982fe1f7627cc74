//! `POST /agent`: relays a message to the agent as SSE or a single JSON body.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{sse::Sse, IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::Deserialize;
use skillgate_agent::QueryOptions;
use skillgate_core::RelayOutcome;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

use crate::dto::{AgentFailure, AgentRequest, AgentResponse};
use crate::error::AppError;
use crate::services::relay::{self, RelayEvent};
use crate::ServerState;

/// The relay reads the next upstream message only once the client has taken
/// all but one of the events already sent.
const EVENT_BUFFER: usize = 1;

/// Optional query params for the agent endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct AgentQuery {
    pub stream: Option<String>,
}

/// Agent endpoint. Streams by default; see [`wants_stream`].
pub async fn agent(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<AgentQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let req = AgentRequest::from_body(&body)?;
    let streaming = wants_stream(
        req.stream,
        query.stream.as_deref(),
        &headers,
        state.settings.stream_by_default,
    );

    info!(
        "Agent request (stream: {}): {}...",
        streaming,
        preview(&req.message)
    );

    let options = QueryOptions::gateway(&state.settings);
    if streaming {
        Ok(stream_response(state, req.message, options))
    } else {
        collect_response(&state, &req.message, &options).await
    }
}

fn stream_response(state: Arc<ServerState>, message: String, options: QueryOptions) -> Response {
    let (tx, rx) = mpsc::channel::<RelayEvent>(EVENT_BUFFER);
    let keepalive = state.settings.keepalive_interval;

    tokio::spawn(async move {
        relay::stream_agent(state.agent.as_ref(), &message, &options, tx, keepalive).await;
    });

    let events = ReceiverStream::new(rx).map(RelayEvent::into_sse);
    ([(header::CONNECTION, "keep-alive")], Sse::new(events)).into_response()
}

async fn collect_response(
    state: &ServerState,
    message: &str,
    options: &QueryOptions,
) -> Result<Response, AppError> {
    let outcome = relay::collect_agent(state.agent.as_ref(), message, options)
        .await
        .map_err(|e| {
            error!("Agent request failed: {}", e);
            AppError::Internal(e.to_string())
        })?;

    let response = match outcome {
        RelayOutcome::Success { response, usage, cost_usd } => Json(AgentResponse {
            success: true,
            response,
            usage,
            cost_usd,
        })
        .into_response(),
        RelayOutcome::Failure { errors } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AgentFailure { success: false, error: errors }),
        )
            .into_response(),
    };
    Ok(response)
}

/// Picks the response mode: body `stream` field, then `?stream=`, then the
/// `Accept` header, then the configured default.
fn wants_stream(body: Option<bool>, query: Option<&str>, headers: &HeaderMap, default: bool) -> bool {
    if let Some(stream) = body {
        return stream;
    }
    if let Some(stream) = query.and_then(parse_flag) {
        return stream;
    }
    if let Some(accept) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) {
        if accept.contains("text/event-stream") {
            return true;
        }
        let json_only = accept
            .split(',')
            .map(|part| part.split(';').next().unwrap_or_default().trim())
            .all(|media| media == "application/json");
        if json_only {
            return false;
        }
    }
    default
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn preview(message: &str) -> &str {
    match message.char_indices().nth(50) {
        Some((idx, _)) => &message[..idx],
        None => message,
    }
}
