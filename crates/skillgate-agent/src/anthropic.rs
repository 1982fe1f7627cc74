//! Agent loop on the Anthropic Messages API with locally executed tools.
//!
//! Each run emits the same message shapes the Claude CLI prints in
//! stream-json mode: a `system`/`init` message, one `assistant` message per
//! model turn, a `user` message carrying tool results after each tool round,
//! and a terminal `result`.

use std::sync::Arc;
use std::time::Instant;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use skillgate_core::{
    AgentError, ResultMessage, ResultSubtype, ToolCall, ToolSchema, UpstreamMessage, Usage,
};
use skillgate_tools::{ToolOutput, ToolRegistry};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{cost_usd, AgentClient, AgentStream, PermissionMode, QueryOptions};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;
const DEFAULT_MAX_TURNS: u32 = 10;

/// Tool definition for Anthropic API.
#[derive(Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

impl From<ToolSchema> for AnthropicTool {
    fn from(schema: ToolSchema) -> Self {
        Self {
            name: schema.name,
            description: schema.description,
            input_schema: schema.parameters,
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [ApiMessage],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [AnthropicTool],
}

fn no_tools(tools: &&[AnthropicTool]) -> bool {
    tools.is_empty()
}

/// Message with content blocks (for tool conversations).
#[derive(Serialize, Clone, Debug)]
struct ApiMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

impl ApiMessage {
    fn user_text(text: &str) -> Self {
        Self {
            role: "user",
            content: vec![ContentBlock::Text { text: text.to_string() }],
        }
    }
}

/// Content block in a message - text, tool_use, or tool_result.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// Thinking and other blocks the loop does not act on.
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
    #[allow(dead_code)]
    stop_reason: Option<String>,
}

impl MessagesResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// The assistant turn as it is sent back on the next request.
    fn into_history(self) -> ApiMessage {
        ApiMessage {
            role: "assistant",
            content: self
                .content
                .into_iter()
                .filter(|block| !matches!(block, ContentBlock::Other))
                .collect(),
        }
    }
}

/// Client that runs the agent loop against Anthropic's Messages API.
pub struct AnthropicAgentClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    tools: Arc<ToolRegistry>,
}

impl AnthropicAgentClient {
    /// Creates a new client whose runs may call every tool in `tools`.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, tools: Arc<ToolRegistry>) -> Self {
        let api_key = api_key.into();
        let model = model.into();
        info!(
            "AnthropicAgentClient: model={}, api_key_len={}, tools={}",
            model,
            api_key.len(),
            tools.tool_names().join(",")
        );
        Self {
            client: Client::new(),
            base_url: ANTHROPIC_API_URL.to_string(),
            api_key,
            model,
            tools,
        }
    }

    /// Points the client at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl AgentClient for AnthropicAgentClient {
    async fn query(&self, prompt: &str, options: &QueryOptions) -> Result<AgentStream, AgentError> {
        let schemas = match &options.allowed_tools {
            Some(names) => self.tools.schemas_for(names),
            None => self.tools.list(),
        };

        let run = AgentRun {
            client: self.client.clone(),
            url: format!("{}/v1/messages", self.base_url),
            api_key: self.api_key.clone(),
            model: options.model.clone().unwrap_or_else(|| self.model.clone()),
            system: options.system_prompt.clone(),
            permission_mode: options.permission_mode,
            max_turns: options.max_turns.unwrap_or(DEFAULT_MAX_TURNS),
            registry: self.tools.clone(),
            tools: schemas.into_iter().map(AnthropicTool::from).collect(),
            session_id: Uuid::new_v4().to_string(),
        };

        Ok(Box::pin(run.into_stream(prompt.to_string())))
    }
}

/// State owned by a single agent run.
struct AgentRun {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    system: Option<String>,
    permission_mode: PermissionMode,
    max_turns: u32,
    registry: Arc<ToolRegistry>,
    tools: Vec<AnthropicTool>,
    session_id: String,
}

impl AgentRun {
    fn into_stream(self, prompt: String) -> impl Stream<Item = Result<UpstreamMessage, AgentError>> + Send {
        try_stream! {
            let start = Instant::now();
            info!("Agent run {} started (model={}, max_turns={})", self.session_id, self.model, self.max_turns);
            yield self.init_message();

            let mut history = vec![ApiMessage::user_text(&prompt)];
            let mut usage = Usage::default();
            let mut turns = 0u32;

            let answer = loop {
                if turns >= self.max_turns {
                    break None;
                }
                turns += 1;

                let raw = self.send(&history).await?;
                let response: MessagesResponse = serde_json::from_value(raw.clone())?;
                usage.accumulate(&response.usage);
                yield self.message("assistant", raw);

                let calls = response.tool_calls();
                if calls.is_empty() {
                    break Some(response.text());
                }

                history.push(response.into_history());
                let mut results = Vec::with_capacity(calls.len());
                for call in &calls {
                    let output = self.run_tool(call).await;
                    results.push(ContentBlock::ToolResult {
                        tool_use_id: call.id.clone(),
                        content: output.text(),
                        is_error: output.is_error,
                    });
                }
                let tool_results = ApiMessage { role: "user", content: results };
                yield self.message("user", serde_json::to_value(&tool_results)?);
                history.push(tool_results);
            };

            yield UpstreamMessage::Result(self.result_message(answer, usage, turns, start));
        }
    }

    fn init_message(&self) -> UpstreamMessage {
        let tools: Vec<&str> = self.tools.iter().map(|t| t.name.as_str()).collect();
        progress(json!({
            "type": "system",
            "subtype": "init",
            "session_id": self.session_id,
            "model": self.model,
            "tools": tools,
            "permissionMode": self.permission_mode,
        }))
    }

    fn message(&self, kind: &str, message: Value) -> UpstreamMessage {
        progress(json!({
            "type": kind,
            "session_id": self.session_id,
            "parent_tool_use_id": null,
            "message": message,
        }))
    }

    fn result_message(
        &self,
        answer: Option<String>,
        usage: Usage,
        turns: u32,
        start: Instant,
    ) -> ResultMessage {
        let mut extra = Map::new();
        extra.insert("session_id".into(), json!(self.session_id));
        extra.insert("num_turns".into(), json!(turns));
        extra.insert("duration_ms".into(), json!(start.elapsed().as_millis() as u64));
        extra.insert("is_error".into(), json!(answer.is_none()));

        let cost = cost_usd(&self.model, &usage);
        info!(
            "Agent run {} finished after {} turns (input={}, output={}, cost=${:.6})",
            self.session_id, turns, usage.input_tokens, usage.output_tokens, cost
        );

        let (subtype, errors) = match &answer {
            Some(_) => (ResultSubtype::Success, Vec::new()),
            None => {
                warn!("Agent run {} hit max turns ({})", self.session_id, self.max_turns);
                (
                    ResultSubtype::Failure("error_max_turns".into()),
                    vec![format!("Reached maximum number of turns ({})", self.max_turns)],
                )
            }
        };

        ResultMessage {
            subtype,
            result: answer,
            usage: Some(usage),
            total_cost_usd: Some(cost),
            errors,
            extra,
        }
    }

    /// Executes a requested tool; failures become error results for the model.
    async fn run_tool(&self, call: &ToolCall) -> ToolOutput {
        if !self.tools.iter().any(|t| t.name == call.name) {
            warn!("Model requested unavailable tool {}", call.name);
            return ToolOutput::error(format!("Tool not available: {}", call.name));
        }

        debug!("Tool call {} -> {}", call.id, call.name);
        match self.registry.execute(&call.name, call.arguments.clone()).await {
            Ok(output) => output,
            Err(e) => ToolOutput::error(e.to_string()),
        }
    }

    async fn send(&self, history: &[ApiMessage]) -> Result<Value, AgentError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: self.system.as_deref(),
            messages: history,
            tools: &self.tools,
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Anthropic API error {}: {}", status, body);
            return Err(AgentError::Api { status: status.as_u16(), body });
        }

        response
            .json()
            .await
            .map_err(|e| AgentError::Decode(e.to_string()))
    }
}

fn progress(value: Value) -> UpstreamMessage {
    match value {
        Value::Object(map) => UpstreamMessage::Progress(map),
        _ => UpstreamMessage::Progress(Map::new()),
    }
}
