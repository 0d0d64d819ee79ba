//! Message types for LLM communication.
//!
//! Defines the conversation a single analytics request builds up with the
//! model: user text, tool-call turns, tool results and the final answer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// ID used to match the result to this call. Generated when the provider has none.
    pub id: String,
    /// Name of the tool to call.
    pub name: String,
    /// Arguments supplied by the model.
    pub arguments: Map<String, JsonValue>,
}

impl ToolCall {
    /// Creates a tool call with a fresh ID.
    pub fn new(name: impl Into<String>, arguments: Map<String, JsonValue>) -> Self {
        Self::with_id(format!("call_{}", uuid::Uuid::new_v4().simple()), name, arguments)
    }

    /// Creates a tool call with a provider-supplied ID.
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: Map<String, JsonValue>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Returns a string argument by name.
    pub fn str_argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(JsonValue::as_str)
    }
}

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result is for.
    pub call_id: String,
    /// Name of the tool that produced it.
    pub name: String,
    /// Structured payload: rows on success, `{"error": ...}` on failure.
    pub content: JsonValue,
}

impl ToolResult {
    /// Creates a result answering `call`.
    pub fn for_call(call: &ToolCall, content: JsonValue) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content,
        }
    }

    /// Returns true if the tool reported an error.
    pub fn is_error(&self) -> bool {
        self.content.get("error").is_some()
    }
}

/// What the model answered on one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    /// Final answer text.
    FinalText(String),
    /// The model wants these tools run before it answers.
    ToolCalls(Vec<ToolCall>),
}

/// Role of a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The caller's query.
    User,
    /// Model output, text or tool calls.
    Model,
    /// Tool results sent back to the model.
    Tool,
}

impl Role {
    /// Returns the role as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
            Self::Tool => "tool",
        }
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    User(String),
    ModelText(String),
    ModelToolCalls(Vec<ToolCall>),
    ToolResults(Vec<ToolResult>),
}

impl Turn {
    /// Returns the role that produced this turn.
    pub fn role(&self) -> Role {
        match self {
            Self::User(_) => Role::User,
            Self::ModelText(_) | Self::ModelToolCalls(_) => Role::Model,
            Self::ToolResults(_) => Role::Tool,
        }
    }
}

/// Ordered turns exchanged with the model for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Creates a new empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the caller's text.
    pub fn add_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::User(content.into()));
    }

    /// Adds a model turn that requested tools.
    pub fn add_tool_calls(&mut self, calls: Vec<ToolCall>) {
        self.turns.push(Turn::ModelToolCalls(calls));
    }

    /// Adds the results for the preceding tool-call turn.
    pub fn add_tool_results(&mut self, results: Vec<ToolResult>) {
        self.turns.push(Turn::ToolResults(results));
    }

    /// Adds a model text turn.
    pub fn add_model_text(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::ModelText(content.into()));
    }

    /// Returns all turns in order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns true if nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Returns the most recent tool results, if the last turn holds them.
    pub fn last_tool_results(&self) -> Option<&[ToolResult]> {
        match self.turns.last() {
            Some(Turn::ToolResults(results)) => Some(results),
            _ => None,
        }
    }

    /// Returns the first user turn's text.
    pub fn first_user_text(&self) -> Option<&str> {
        self.turns.iter().find_map(|turn| match turn {
            Turn::User(text) => Some(text.as_str()),
            _ => None,
        })
    }
}
