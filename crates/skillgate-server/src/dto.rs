//! Data transfer objects for HTTP message serialization.

use serde::Serialize;
use serde_json::Value;
use skillgate_config::{ApiKeyFormat, Backend, Settings};
use skillgate_core::Usage;

use crate::error::AppError;

pub const MESSAGE_REQUIRED: &str = "message field is required";

/// Routes listed in 404 responses.
pub const AVAILABLE_ENDPOINTS: [&str; 5] = [
    "GET /health",
    "GET /skills",
    "POST /skills/{name}",
    "POST /agent",
    "GET /",
];

// === Agent Types ===

/// Validated body of `POST /agent`.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRequest {
    pub message: String,
    /// Explicit response mode, if the client chose one.
    pub stream: Option<bool>,
}

impl AgentRequest {
    /// Parses and validates a raw request body.
    ///
    /// `message` must be a non-blank string. A non-boolean `stream` is ignored.
    pub fn from_body(body: &[u8]) -> Result<Self, AppError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?;

        let message = value
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest(MESSAGE_REQUIRED.into()))?;

        Ok(Self {
            message: message.to_string(),
            stream: value.get("stream").and_then(Value::as_bool),
        })
    }
}

/// Successful non-streaming agent response.
#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub success: bool,
    pub response: String,
    pub usage: Option<Usage>,
    pub cost_usd: Option<f64>,
}

/// Failed non-streaming agent response.
#[derive(Debug, Serialize)]
pub struct AgentFailure {
    pub success: bool,
    pub error: Vec<String>,
}

/// SSE event data types.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseData {
    Progress {
        data: Value,
    },
    Complete {
        response: String,
        usage: Option<Usage>,
        cost_usd: Option<f64>,
    },
    Error {
        errors: Vec<String>,
    },
}

// === Skill Types ===

#[derive(Debug, Serialize)]
pub struct SkillInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct SkillsResponse {
    pub skills: Vec<SkillInfo>,
}

// === Diagnostics ===

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<HealthConfig>,
}

/// Non-secret view of the running configuration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthConfig {
    pub api_key_set: bool,
    pub api_key_format: ApiKeyFormat,
    pub backend: Backend,
    pub model: String,
    pub stream_by_default: bool,
}

impl HealthConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let api_key_format = settings.api_key_format();
        Self {
            api_key_set: !matches!(api_key_format, ApiKeyFormat::Missing | ApiKeyFormat::Empty),
            api_key_format,
            backend: settings.backend,
            model: settings.model.clone(),
            stream_by_default: settings.stream_by_default,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundResponse {
    pub error: &'static str,
    pub available_endpoints: [&'static str; 5],
}
