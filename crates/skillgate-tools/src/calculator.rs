use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{Tool, ToolError, ToolOutput};

/// Calculator tool - add, subtract, multiply or divide two numbers
pub struct CalculatorTool;

/// Supported arithmetic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "add" => Some(Self::Add),
            "subtract" => Some(Self::Subtract),
            "multiply" => Some(Self::Multiply),
            "divide" => Some(Self::Divide),
            _ => None,
        }
    }

    fn apply(self, a: f64, b: f64) -> Result<f64, &'static str> {
        match self {
            Self::Add => Ok(a + b),
            Self::Subtract => Ok(a - b),
            Self::Multiply => Ok(a * b),
            Self::Divide if b == 0.0 => Err("Cannot divide by zero"),
            Self::Divide => Ok(a / b),
        }
    }
}

/// Accepts JSON numbers and numeric strings.
fn parse_operand(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (!n.is_nan()).then_some(n)
}

/// Integral results are emitted as JSON integers.
fn number(n: f64) -> Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        json!(n as i64)
    } else {
        json!(n)
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Performs basic math operations (add, subtract, multiply, divide)"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["add", "subtract", "multiply", "divide"],
                    "description": "The arithmetic operation to perform"
                },
                "a": {
                    "type": "number",
                    "description": "First operand"
                },
                "b": {
                    "type": "number",
                    "description": "Second operand"
                }
            },
            "required": ["operation", "a", "b"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        if !args.is_object() {
            return Err(ToolError::InvalidArguments(
                "calculator expects a JSON object".to_string(),
            ));
        }

        let (Some(a), Some(b)) = (parse_operand(args.get("a")), parse_operand(args.get("b"))) else {
            return Ok(ToolOutput::error("Invalid numbers provided"));
        };

        let name = args.get("operation").and_then(Value::as_str).unwrap_or_default();
        let Some(operation) = Operation::parse(name) else {
            return Ok(ToolOutput::error(
                "Unknown operation. Use: add, subtract, multiply, or divide",
            ));
        };

        match operation.apply(a, b) {
            Ok(result) => Ok(ToolOutput::success(json!({
                "operation": name,
                "a": number(a),
                "b": number(b),
                "result": number(result),
            }))),
            Err(message) => Ok(ToolOutput::error(message)),
        }
    }
}
