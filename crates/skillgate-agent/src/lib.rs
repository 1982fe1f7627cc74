//! Upstream agent clients for skillgate.
//!
//! An agent run is started with a prompt and a set of [`QueryOptions`] and
//! produces a lazy, single-consumer [`AgentStream`] of
//! [`UpstreamMessage`](skillgate_core::UpstreamMessage)s that ends after the
//! terminal `result` message.
//!
//! - [`AgentClient`] - The trait the relay consumes
//! - [`AnthropicAgentClient`] - Agent loop on the Messages API with local tools
//! - [`ClaudeCliClient`] - The Claude CLI in stream-json mode
//! - [`client_for`] - Builds the backend selected in [`Settings`]
//!
//! # Streaming
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use skillgate_agent::{client_for, QueryOptions};
//!
//! let client = client_for(&settings, registry);
//! let mut stream = client.query("What is 2 + 3?", &QueryOptions::gateway(&settings)).await?;
//!
//! while let Some(msg) = stream.next().await {
//!     println!("{}", msg?.message_type());
//! }
//! ```

mod anthropic;
mod cli;
mod pricing;

pub use anthropic::AnthropicAgentClient;
pub use cli::ClaudeCliClient;
pub use pricing::cost_usd;

use std::fmt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use skillgate_config::{Backend, Settings};
use skillgate_core::{AgentError, UpstreamMessage};
use skillgate_tools::ToolRegistry;

/// A stream of agent messages.
pub type AgentStream = Pin<Box<dyn Stream<Item = Result<UpstreamMessage, AgentError>> + Send>>;

/// How the agent treats actions that would normally need approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    #[default]
    Default,
    AcceptEdits,
    Plan,
    BypassPermissions,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::Plan => "plan",
            Self::BypassPermissions => "bypassPermissions",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the agent loads settings (and project skills) from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingSource {
    User,
    Project,
    Local,
}

impl SettingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Project => "project",
            Self::Local => "local",
        }
    }
}

/// Per-run agent configuration.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub permission_mode: PermissionMode,
    pub setting_sources: Vec<SettingSource>,
    /// Overrides the client's default model.
    pub model: Option<String>,
    pub max_turns: Option<u32>,
    /// Appended to the agent's system prompt.
    pub system_prompt: Option<String>,
    /// Restricts the tools the agent may call. `None` allows all.
    pub allowed_tools: Option<Vec<String>>,
    /// Working directory of the agent process (CLI backend).
    pub cwd: Option<PathBuf>,
}

impl QueryOptions {
    /// The fixed options the gateway uses for every request.
    pub fn gateway(settings: &Settings) -> Self {
        Self {
            permission_mode: PermissionMode::BypassPermissions,
            setting_sources: vec![SettingSource::Project],
            model: Some(settings.model.clone()),
            max_turns: Some(settings.max_turns),
            cwd: settings.project_dir().map(Path::to_path_buf),
            ..Default::default()
        }
    }
}

/// A conversational agent that answers a prompt with a stream of messages.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Starts an agent run.
    ///
    /// Errors returned here mean the run could not be started at all; errors
    /// during the run arrive as `Err` items on the stream, after which the
    /// stream ends.
    async fn query(&self, prompt: &str, options: &QueryOptions) -> Result<AgentStream, AgentError>;
}

/// Builds the upstream client selected by the settings.
pub fn client_for(settings: &Settings, tools: Arc<ToolRegistry>) -> Arc<dyn AgentClient> {
    let api_key = settings.api_key.clone().unwrap_or_default();
    match settings.backend {
        Backend::Api => Arc::new(AnthropicAgentClient::new(api_key, &settings.model, tools)),
        Backend::Cli => Arc::new(ClaudeCliClient::new(&settings.cli_path).with_api_key(api_key)),
    }
}
