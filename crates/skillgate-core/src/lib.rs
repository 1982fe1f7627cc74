//! Core domain types and error definitions for skillgate.
//!
//! This crate provides the types shared across the gateway:
//!
//! - [`AgentError`] - Error type for upstream agent calls
//! - [`UpstreamMessage`] and [`ResultMessage`] - Messages produced by the agent
//! - [`Usage`] - Token accounting attached to results
//! - [`RelayOutcome`] and [`OutcomeTracker`] - Success/failure verdict of a run
//! - [`ToolCall`], [`ToolSchema`] - Tool interaction types
//!
//! # Example
//!
//! ```rust
//! use skillgate_core::{RelayOutcome, UpstreamMessage};
//!
//! let messages: Vec<UpstreamMessage> = [
//!     r#"{"type":"system","subtype":"init"}"#,
//!     r#"{"type":"result","subtype":"success","result":"hi","total_cost_usd":0.01}"#,
//! ]
//! .iter()
//! .map(|line| serde_json::from_str(line).unwrap())
//! .collect();
//!
//! assert!(RelayOutcome::from_messages(&messages).is_success());
//! ```

mod message;
mod outcome;

pub use message::{ResultMessage, ResultSubtype, UpstreamMessage, Usage};
pub use outcome::{OutcomeTracker, RelayOutcome, UNKNOWN_ERROR};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while invoking or consuming the upstream agent.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Transport-level failure talking to the agent service.
    #[error("Agent request failed: {0}")]
    Request(String),

    /// The agent API answered with a non-success status.
    #[error("Agent API error {status}: {body}")]
    Api { status: u16, body: String },

    /// A message from the agent could not be decoded.
    #[error("Failed to decode agent message: {0}")]
    Decode(String),

    /// The agent process could not be started.
    #[error("Failed to start agent process: {0}")]
    Spawn(String),

    /// The agent process exited unsuccessfully without producing a result.
    #[error("Agent process exited with {status}: {stderr}")]
    ProcessFailed { status: String, stderr: String },
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Decode(err.to_string())
    }
}

// ============================================================================
// Tool Types
// ============================================================================

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call (used to match results).
    pub id: String,
    /// Name of the tool to execute.
    pub name: String,
    /// Arguments to pass to the tool (JSON object).
    pub arguments: serde_json::Value,
}

/// JSON schema describing a tool for model function calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique name of the tool (e.g., "calculator").
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's input.
    pub parameters: serde_json::Value,
}
