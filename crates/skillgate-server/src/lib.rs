//! HTTP/SSE gateway in front of a Claude agent.
//!
//! Builds the Axum router: the agent relay (`POST /agent`), direct skill
//! invocation, health diagnostics and a static page.

mod cors;
mod dto;
mod error;
mod handlers;
mod services;

pub use error::AppError;
pub use services::relay::{collect_agent, stream_agent, RelayEvent};

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use skillgate_agent::AgentClient;
use skillgate_config::Settings;
use skillgate_tools::ToolRegistry;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared server state accessible from all handlers.
pub struct ServerState {
    pub settings: Settings,
    pub tool_registry: Arc<ToolRegistry>,
    pub agent: Arc<dyn AgentClient>,
}

impl ServerState {
    pub fn new(settings: Settings, tool_registry: Arc<ToolRegistry>, agent: Arc<dyn AgentClient>) -> Self {
        Self {
            settings,
            tool_registry,
            agent,
        }
    }
}

/// Builds the application router.
pub fn create_app(state: Arc<ServerState>) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                version = ?req.version(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    let logged_routes = Router::new()
        .route(
            "/agent",
            post(handlers::agent::agent).fallback(handlers::not_found),
        )
        .route(
            "/skills",
            get(handlers::skills::list).fallback(handlers::not_found),
        )
        .route(
            "/skills/{name}",
            post(handlers::skills::invoke).fallback(handlers::not_found),
        )
        .route("/", get(handlers::page::index).fallback(handlers::not_found))
        .route(
            "/index.html",
            get(handlers::page::index).fallback(handlers::not_found),
        )
        .layer(trace_layer);

    Router::new()
        .merge(logged_routes)
        .route("/health", get(handlers::health).fallback(handlers::not_found))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), cors::cors))
        .with_state(state)
}
