use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::{Tool, ToolError, ToolOutput};

const DEFAULT_NAME: &str = "friend";

/// Greeting tool - responds with a friendly message and a timestamp
pub struct GreetingTool;

#[async_trait]
impl Tool for GreetingTool {
    fn name(&self) -> &str {
        "greeting"
    }

    fn description(&self) -> &str {
        "Greets the user with a friendly message"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Name of the person to greet (default: friend)"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let name = match args.get("name") {
            None | Some(Value::Null) => DEFAULT_NAME,
            Some(Value::String(name)) => name.as_str(),
            Some(_) => {
                return Err(ToolError::InvalidArguments(
                    "'name' must be a string".to_string(),
                ))
            }
        };

        Ok(ToolOutput::success(json!({
            "message": format!(
                "Hello, {}! I'm a simple agent with skills. How can I help you today?",
                name
            ),
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })))
    }
}
