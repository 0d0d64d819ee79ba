//! Google Gemini client implementation.
//!
//! Implements the LlmClient trait for the Gemini `generateContent` REST API,
//! including function declarations and `functionCall`/`functionResponse` parts.

use async_trait::async_trait;
use reqwest::Client;
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

/// Gemini API base URL.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Maximum number of retry attempts for transient errors.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use (e.g., "gemini-1.5-flash").
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// API base URL, overridable for proxies.
    pub base_url: String,
}

impl GeminiConfig {
    /// Creates a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Gemini LLM client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl GeminiClient {
    /// Creates a new Gemini client with the given configuration.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Builds the `generateContent` request body.
    fn build_request(
        system_instruction: &str,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> JsonValue {
        let contents: Vec<JsonValue> = conversation
            .turns()
            .iter()
            .map(|turn| match turn {
                Turn::User(text) => json!({"role": "user", "parts": [{"text": text}]}),
                Turn::ModelText(text) => json!({"role": "model", "parts": [{"text": text}]}),
                Turn::ModelToolCalls(calls) => json!({
                    "role": "model",
                    "parts": calls
                        .iter()
                        .map(|c| json!({"functionCall": {"name": c.name, "args": c.arguments}}))
                        .collect::<Vec<_>>(),
                }),
                // Function responses travel in a user turn.
                Turn::ToolResults(results) => json!({
                    "role": "user",
                    "parts": results
                        .iter()
                        .map(|r| json!({"functionResponse": {
                            "name": r.name,
                            "response": as_object(&r.content),
                        }}))
                        .collect::<Vec<_>>(),
                }),
            })
            .collect();

        let mut request = json!({
            "systemInstruction": {"parts": [{"text": system_instruction}]},
            "contents": contents,
        });

        if !tools.is_empty() {
            let declarations: Vec<JsonValue> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect();
            request["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        request
    }

    /// Interprets a successful response body.
    fn parse_response(body: &JsonValue) -> Result<ModelResponse> {
        let parts = body
            .pointer("/candidates/0/content/parts")
            .and_then(JsonValue::as_array);

        if parts.is_none() {
            if let Some(reason) = body
                .pointer("/promptFeedback/blockReason")
                .and_then(JsonValue::as_str)
            {
                return Err(ServiceError::llm(format!(
                    "Gemini blocked the request ({reason})"
                )));
            }
        }

        let calls: Vec<ToolCall> = parts
            .into_iter()
            .flatten()
            .filter_map(|part| part.get("functionCall"))
            .filter_map(|call| {
                let name = call.get("name")?.as_str()?;
                let arguments = call
                    .get("args")
                    .and_then(JsonValue::as_object)
                    .cloned()
                    .unwrap_or_default();
                Some(ToolCall::new(name, arguments))
            })
            .collect();

        if calls.is_empty() {
            Ok(ModelResponse::FinalText(extract_text(body)))
        } else {
            Ok(ModelResponse::ToolCalls(calls))
        }
    }

    /// Parses an API error response and returns (error, is_retryable).
    fn parse_error(status: reqwest::StatusCode, body: &str) -> (ServiceError, bool) {
        let message = serde_json::from_str::<JsonValue>(body)
            .ok()
            .and_then(|v| v.pointer("/error/message")?.as_str().map(String::from));

        let mentions_key = message.as_deref().is_some_and(|m| {
            let lower = m.to_lowercase();
            lower.contains("api key") || lower.contains("api_key")
        });

        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
            || mentions_key
        {
            return (
                ServiceError::llm("Authentication failed. Check your GEMINI_API_KEY."),
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
        let error = match message {
            Some(message) => ServiceError::llm(format!("Gemini API error: {}", message)),
            None => ServiceError::llm(format!("Gemini API error ({}): {}", status, body)),
        };
        (error, is_retryable)
    }
}

/// `functionResponse.response` must be an object.
fn as_object(content: &JsonValue) -> JsonValue {
    if content.is_object() {
        content.clone()
    } else {
        let mut wrapped = Map::new();
        wrapped.insert("result".to_string(), content.clone());
        JsonValue::Object(wrapped)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(
        &self,
        system_instruction: &str,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse> {
        let request = Self::build_request(system_instruction, conversation, tools);
        let endpoint = self.config.endpoint();

        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;

        loop {
            debug!(
                "Gemini API request attempt {} of {}",
                attempt, MAX_RETRY_ATTEMPTS
            );

            let result = self
                .client
                .post(&endpoint)
                .header("x-goog-api-key", &self.config.api_key)
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
                        let value: JsonValue = serde_json::from_str(&body).map_err(|e| {
                            ServiceError::llm(format!("Failed to parse response: {}", e))
                        })?;
                        return Self::parse_response(&value);
                    }

                    Self::parse_error(status, &body)
                }
                Err(e) => {
                    let is_retryable = e.is_timeout() || e.is_connect();
                    let error = if e.is_timeout() {
                        ServiceError::llm("Request timed out. Try again.")
                    } else if e.is_connect() {
                        ServiceError::llm("Failed to connect to Gemini API. Check your network.")
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
                "Gemini API request failed (attempt {}), retrying in {:?}: {}",
                attempt, delay, error
            );
            tokio::time::sleep(delay).await;
            delay *= 2;
            attempt += 1;
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
