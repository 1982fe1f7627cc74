//! HTTP server entry point.
//!
//! Loads settings from the environment, builds the tool registry and the
//! configured agent backend, and serves the gateway.

use std::sync::Arc;

use anyhow::Result;
use skillgate_agent::client_for;
use skillgate_config::Settings;
use skillgate_server::{create_app, ServerState};
use skillgate_tools::ToolRegistry;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let key_format = settings.api_key_format();
    if !key_format.is_valid() {
        warn!("ANTHROPIC_API_KEY looks malformed ({:?}); upstream calls may fail", key_format);
    }

    let tool_registry = Arc::new(ToolRegistry::with_defaults());
    info!("Registered {} skills: {}", tool_registry.list().len(), tool_registry.tool_names().join(", "));

    let agent = client_for(&settings, tool_registry.clone());
    let addr = settings.socket_addr()?;

    info!("Backend: {} (model {})", settings.backend, settings.model);
    info!("Skills directory: {}", settings.skills_dir.display());
    if let Some(root) = settings.project_dir() {
        info!("Agent working directory: {}", root.display());
    }
    info!("Endpoints:");
    info!("  GET  /health");
    info!("  GET  /skills");
    info!("  POST /skills/{{name}}");
    info!("  POST /agent");
    info!("  GET  /");

    let app = create_app(Arc::new(ServerState::new(settings, tool_registry, agent)));

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
