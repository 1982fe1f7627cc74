//! Messages emitted by the upstream agent.
//!
//! The agent speaks newline-delimited JSON objects discriminated on `type`.
//! Only `result` messages are interpreted; everything else is carried as the
//! raw object so the relay can forward it untouched.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::AgentError;

/// One message from the agent's output sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamMessage {
    /// Any non-terminal message (`system`, `assistant`, `user`, ...), kept verbatim.
    Progress(Map<String, Value>),
    /// The terminal `result` message.
    Result(ResultMessage),
}

impl UpstreamMessage {
    /// Decodes a message from a JSON value.
    pub fn from_value(value: Value) -> Result<Self, AgentError> {
        let Value::Object(mut map) = value else {
            return Err(AgentError::Decode("agent message is not a JSON object".into()));
        };

        let is_result = match map.get("type") {
            Some(Value::String(t)) => t == "result",
            Some(_) => return Err(AgentError::Decode("message `type` is not a string".into())),
            None => return Err(AgentError::Decode("message has no `type` field".into())),
        };

        if !is_result {
            return Ok(Self::Progress(map));
        }

        map.remove("type");
        let result: ResultMessage = serde_json::from_value(Value::Object(map))?;
        Ok(Self::Result(result))
    }

    /// Decodes a message from one line of stream-json output.
    pub fn from_json_line(line: &str) -> Result<Self, AgentError> {
        let value: Value = serde_json::from_str(line)?;
        Self::from_value(value)
    }

    /// Returns the `type` discriminator of this message.
    pub fn message_type(&self) -> &str {
        match self {
            Self::Progress(map) => map.get("type").and_then(Value::as_str).unwrap_or("unknown"),
            Self::Result(_) => "result",
        }
    }

    /// Returns the result payload if this is a `result` message.
    pub fn as_result(&self) -> Option<&ResultMessage> {
        match self {
            Self::Result(result) => Some(result),
            Self::Progress(_) => None,
        }
    }

    /// Re-encodes the message as the JSON object it was decoded from.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Progress(map) => Value::Object(map.clone()),
            Self::Result(result) => {
                let mut map = match serde_json::to_value(result) {
                    Ok(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                map.insert("type".into(), Value::String("result".into()));
                Value::Object(map)
            }
        }
    }
}

impl Serialize for UpstreamMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UpstreamMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}

/// Outcome tag of a `result` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResultSubtype {
    Success,
    /// Any other subtype, e.g. `error_max_turns` or `error_during_execution`.
    Failure(String),
}

impl From<String> for ResultSubtype {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "success" => Self::Success,
            _ => Self::Failure(tag),
        }
    }
}

impl From<ResultSubtype> for String {
    fn from(subtype: ResultSubtype) -> Self {
        match subtype {
            ResultSubtype::Success => "success".into(),
            ResultSubtype::Failure(tag) => tag,
        }
    }
}

/// Terminal message of an agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub subtype: ResultSubtype,
    /// Final response text (success only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost_usd: Option<f64>,
    /// Error descriptions (failure only).
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Remaining fields (`session_id`, `num_turns`, `duration_ms`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultMessage {
    pub fn is_success(&self) -> bool {
        self.subtype == ResultSubtype::Success
    }
}

/// Token accounting reported by the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub input_tokens: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Usage {
    /// Adds another turn's token counts to this one.
    pub fn accumulate(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_creation_input_tokens =
            sum_optional(self.cache_creation_input_tokens, other.cache_creation_input_tokens);
        self.cache_read_input_tokens =
            sum_optional(self.cache_read_input_tokens, other.cache_read_input_tokens);
    }
}

/// Reads an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn sum_optional(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    }
}
