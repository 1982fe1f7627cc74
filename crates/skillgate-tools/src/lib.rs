//! Tool registry and built-in skills for skillgate.
//!
//! This crate provides the tool abstraction shared by the direct skill
//! endpoint and the agent's tool-use loop:
//!
//! - [`Tool`] - Trait for implementing skills
//! - [`ToolOutput`] - Result content plus an error flag
//! - [`ToolRegistry`] - Registry for looking tools up by name
//! - [`GreetingTool`] - Friendly greeting with a timestamp
//! - [`CalculatorTool`] - Basic arithmetic
//!
//! # Using the Registry
//!
//! ```rust,ignore
//! use skillgate_tools::ToolRegistry;
//!
//! let registry = ToolRegistry::with_defaults();
//! let output = registry
//!     .execute("calculator", serde_json::json!({ "operation": "add", "a": 2, "b": 3 }))
//!     .await?;
//! assert_eq!(output.content["result"], 5);
//! ```

mod calculator;
mod greeting;

pub use calculator::CalculatorTool;
pub use greeting::GreetingTool;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub use skillgate_core::{ToolCall, ToolSchema};

/// Errors that can occur during tool lookup or execution.
///
/// Domain failures such as dividing by zero are not errors; they are
/// reported through [`ToolOutput::error`].
#[derive(Error, Debug)]
pub enum ToolError {
    /// Invalid arguments were passed to the tool.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Requested tool was not found in the registry.
    #[error("Tool not found: {0}")]
    NotFound(String),
}

/// Output of a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    /// JSON content returned to the caller.
    pub content: Value,
    /// True when the content describes a failure (`{"error": ...}`).
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(content: Value) -> Self {
        Self { content, is_error: false }
    }

    /// Creates an error result carrying `{"error": message}`.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: json!({ "error": message.into() }),
            is_error: true,
        }
    }

    /// Renders the content as text for a model-facing tool result.
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Trait for implementing tools that can be called directly or by the agent.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of this tool.
    fn name(&self) -> &str;

    /// Returns a description of what this tool does.
    fn description(&self) -> &str;

    /// Returns the JSON Schema for this tool's input.
    fn parameters(&self) -> Value;

    /// Executes the tool with the given arguments.
    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError>;

    /// Generates the schema for this tool (default implementation).
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Registry of tools, immutable once the server has started.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Creates an empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Creates a registry with the built-in `greeting` and `calculator` skills.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(GreetingTool);
        registry.register(CalculatorTool);
        registry
    }

    /// Registers a tool in the registry.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    /// Gets a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Returns schemas for all registered tools, ordered by name.
    pub fn list(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Returns schemas for the specified tool names.
    ///
    /// Unknown tool names are silently ignored.
    pub fn schemas_for(&self, names: &[String]) -> Vec<ToolSchema> {
        names
            .iter()
            .filter_map(|name| self.tools.get(name).map(|t| t.schema()))
            .collect()
    }

    /// Returns true if a tool with the given name is registered.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Returns the names of all registered tools.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Looks up a tool by name and runs it.
    pub async fn execute(&self, name: &str, args: Value) -> Result<ToolOutput, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        debug!("Executing tool {} with {}", name, args);
        let output = tool.execute(args).await?;
        debug!("Tool {} finished (is_error: {})", name, output.is_error);

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_listed_by_name() {
        let registry = ToolRegistry::with_defaults();

        assert_eq!(registry.tool_names(), vec!["calculator", "greeting"]);
        assert!(registry.has("greeting"));
        assert!(!registry.has("dice-roller"));

        let schemas = registry.list();
        assert_eq!(schemas[0].name, "calculator");
        assert_eq!(schemas[0].parameters["required"], json!(["operation", "a", "b"]));
    }

    #[test]
    fn schemas_for_skips_unknown_names() {
        let registry = ToolRegistry::with_defaults();
        let schemas = registry.schemas_for(&["greeting".into(), "nope".into()]);

        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "greeting");
    }

    #[tokio::test]
    async fn execute_unknown_tool_is_not_found() {
        let registry = ToolRegistry::with_defaults();
        let err = registry.execute("nope", json!({})).await.unwrap_err();

        assert!(matches!(err, ToolError::NotFound(name) if name == "nope"));
    }

    #[test]
    fn error_output_serializes_error_field() {
        let output = ToolOutput::error("Cannot divide by zero");

        assert!(output.is_error);
        assert_eq!(output.text(), r#"{"error":"Cannot divide by zero"}"#);
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({ "content": { "error": "Cannot divide by zero" }, "isError": true })
        );
    }
}
