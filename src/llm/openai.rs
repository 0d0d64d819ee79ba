//! OpenAI LLM client implementation.
//!
//! Implements the LlmClient trait for OpenAI's chat completions API with
//! `tools` / `tool_calls` function calling.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, ServiceError};
use crate::llm::extract::extract_text;
use crate::llm::tools::ToolDefinition;
use crate::llm::types::{Conversation, ModelResponse, ToolCall, Turn};
use crate::llm::LlmClient;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// OpenAI API URL.
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Maximum number of retry attempts for transient errors.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// OpenAI client configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use (e.g., "gpt-4o").
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Chat completions endpoint.
    pub api_url: String,
}

impl OpenAiConfig {
    /// Creates a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            api_url: OPENAI_API_URL.to_string(),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the endpoint, for OpenAI-compatible servers.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

/// OpenAI LLM client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    /// Creates a new OpenAI client with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Converts the conversation to OpenAI chat messages.
    fn convert_messages(system_instruction: &str, conversation: &Conversation) -> Vec<OpenAiMessage> {
        let mut messages = vec![OpenAiMessage::text("system", system_instruction)];

        for turn in conversation.turns() {
            match turn {
                Turn::User(text) => messages.push(OpenAiMessage::text("user", text)),
                Turn::ModelText(text) => messages.push(OpenAiMessage::text("assistant", text)),
                Turn::ModelToolCalls(calls) => messages.push(OpenAiMessage {
                    role: "assistant".to_string(),
                    content: None,
                    tool_calls: Some(
                        calls
                            .iter()
                            .map(|c| OpenAiToolCall {
                                id: c.id.clone(),
                                kind: "function".to_string(),
                                function: OpenAiFunctionCall {
                                    name: c.name.clone(),
                                    arguments: JsonValue::Object(c.arguments.clone()).to_string(),
                                },
                            })
                            .collect(),
                    ),
                    tool_call_id: None,
                }),
                // One tool message per result, matched by id.
                Turn::ToolResults(results) => {
                    messages.extend(results.iter().map(|r| OpenAiMessage {
                        role: "tool".to_string(),
                        content: Some(r.content.to_string()),
                        tool_calls: None,
                        tool_call_id: Some(r.call_id.clone()),
                    }))
                }
            }
        }

        messages
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<JsonValue> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }

    /// Interprets a successful response body.
    fn parse_response(body: &str) -> Result<ModelResponse> {
        let raw: JsonValue = serde_json::from_str(body)
            .map_err(|e| ServiceError::llm(format!("Failed to parse response: {}", e)))?;
        let response: OpenAiResponse = serde_json::from_value(raw.clone())
            .map_err(|e| ServiceError::llm(format!("Failed to parse response: {}", e)))?;

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| ServiceError::llm("No response from OpenAI"))?;

        let calls: Vec<ToolCall> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| {
                // Arguments arrive as a JSON string; anything unparseable becomes empty.
                let arguments = serde_json::from_str::<Map<String, JsonValue>>(&c.function.arguments)
                    .unwrap_or_default();
                ToolCall::with_id(c.id, c.function.name, arguments)
            })
            .collect();

        if !calls.is_empty() {
            return Ok(ModelResponse::ToolCalls(calls));
        }

        match message.content {
            Some(content) if !content.is_empty() => Ok(ModelResponse::FinalText(content)),
            _ => Ok(ModelResponse::FinalText(extract_text(&raw))),
        }
    }

    /// Parses an API error response and returns (error, is_retryable).
    fn parse_error(status: reqwest::StatusCode, body: &str) -> (ServiceError, bool) {
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return (
                ServiceError::llm("Authentication failed. Check your OPENAI_API_KEY."),
                false,
            );
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return (
                ServiceError::llm("Rate limited. Please wait and try again."),
                true,
            );
        }

        let is_retryable = status.is_server_error();

        if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            return (
                ServiceError::llm(format!(
                    "OpenAI API error: {}",
                    error_response.error.message
                )),
                is_retryable,
            );
        }

        (
            ServiceError::llm(format!("OpenAI API error ({}): {}", status, body)),
            is_retryable,
        )
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(
        &self,
        system_instruction: &str,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse> {
        let request = OpenAiRequest {
            model: self.config.model.clone(),
            messages: Self::convert_messages(system_instruction, conversation),
            tools: Self::convert_tools(tools),
        };

        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;

        loop {
            debug!(
                "OpenAI API request attempt {} of {}",
                attempt, MAX_RETRY_ATTEMPTS
            );

            let result = self
                .client
                .post(&self.config.api_url)
                .bearer_auth(&self.config.api_key)
                .json(&request)
                .send()
                .await;

            let (error, is_retryable) = match result {
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .map_err(|e| ServiceError::llm(format!("Failed to read response: {}", e)))?;

                    if status.is_success() {
                        return Self::parse_response(&body);
                    }

                    Self::parse_error(status, &body)
                }
                Err(e) => {
                    let is_retryable = e.is_timeout() || e.is_connect();
                    let error = if e.is_timeout() {
                        ServiceError::llm("Request timed out. Try again.")
                    } else if e.is_connect() {
                        ServiceError::llm("Failed to connect to OpenAI API. Check your network.")
                    } else {
                        ServiceError::llm(format!("Request failed: {}", e.without_url()))
                    };
                    (error, is_retryable)
                }
            };

            if !is_retryable || attempt >= MAX_RETRY_ATTEMPTS {
                return Err(error);
            }

            warn!(
                "OpenAI API request failed (attempt {}), retrying in {:?}: {}",
                attempt, delay, error
            );
            tokio::time::sleep(delay).await;
            delay *= 2; // Exponential backoff
            attempt += 1;
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<JsonValue>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OpenAiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: OpenAiFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}
