//! Mock LLM clients for testing and offline use.
//!
//! `MockLlmClient` behaves like a tiny analyst: it issues one SQL tool call
//! chosen from the question, then summarizes the rows it gets back.
//! `ScriptedLlmClient` replays a fixed script and records what it was sent.

use async_trait::async_trait;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, ServiceError};
use crate::llm::tools::{ToolDefinition, SQL_TOOL_NAME};
use crate::llm::types::{Conversation, ModelResponse, ToolCall, ToolResult};
use crate::llm::LlmClient;

/// States present in the demo dataset.
const KNOWN_STATES: &[&str] = &["Punjab", "Haryana", "Karnataka", "Maharashtra"];

/// Rows quoted in a mock summary.
const SUMMARY_ROWS: usize = 5;

/// Mock LLM client that answers from the demo tables.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    /// Custom SQL mappings (pattern -> SQL).
    custom_queries: Vec<(String, String)>,
}

impl MockLlmClient {
    /// Creates a new mock client with the default question patterns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom mapping: questions containing `pattern` run `sql`.
    pub fn with_query(mut self, pattern: impl Into<String>, sql: impl Into<String>) -> Self {
        self.custom_queries.push((pattern.into(), sql.into()));
        self
    }

    /// Chooses the SQL to run for a question.
    fn sql_for(&self, question: &str) -> String {
        let lower = question.to_lowercase();

        if let Some((_, sql)) = self
            .custom_queries
            .iter()
            .find(|(pattern, _)| lower.contains(&pattern.to_lowercase()))
        {
            return sql.clone();
        }

        let state_filter = |column: &str| {
            KNOWN_STATES
                .iter()
                .find(|state| lower.contains(&state.to_lowercase()))
                .map(|state| format!(" WHERE {column} = '{state}'"))
                .unwrap_or_default()
        };

        if lower.contains("rainfall") && (lower.contains("yield") || lower.contains("crop")) {
            format!(
                "SELECT c.state, c.year, AVG(c.yield_tonnes_per_hectare) AS avg_yield, \
                 r.annual_rainfall_mm \
                 FROM crop_production c JOIN rainfall r ON c.state = r.state AND c.year = r.year{} \
                 GROUP BY c.state, c.year, r.annual_rainfall_mm ORDER BY c.state, c.year",
                state_filter("c.state")
            )
        } else if lower.contains("rainfall") || lower.contains("monsoon") {
            format!(
                "SELECT state, year, annual_rainfall_mm, monsoon_rainfall_mm FROM rainfall{} \
                 ORDER BY state, year",
                state_filter("state")
            )
        } else {
            format!(
                "SELECT state, crop, year, production_tonnes FROM crop_production{} \
                 ORDER BY state, crop, year",
                state_filter("state")
            )
        }
    }

    /// Summarizes tool results as a short answer.
    fn summarize(results: &[ToolResult]) -> String {
        let mut answer = String::from("## Analysis\n\n");

        for result in results {
            if let Some(error) = result.content.get("error").and_then(JsonValue::as_str) {
                answer.push_str(&format!("The query could not be run: {error}\n"));
                continue;
            }

            let rows = result
                .content
                .get("rows")
                .and_then(JsonValue::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if rows.is_empty() {
                answer.push_str("The database returned no matching rows.\n");
                continue;
            }

            answer.push_str(&format!(
                "Based on {} row(s) from the database:\n",
                rows.len()
            ));
            for row in rows.iter().take(SUMMARY_ROWS) {
                let fields: Vec<String> = row
                    .as_object()
                    .map(|map| map.iter().map(|(k, v)| format!("{k}: {v}")).collect())
                    .unwrap_or_default();
                answer.push_str(&format!("- {}\n", fields.join(", ")));
            }
            if rows.len() > SUMMARY_ROWS {
                answer.push_str(&format!("- ... and {} more\n", rows.len() - SUMMARY_ROWS));
            }
        }

        answer
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(
        &self,
        _system_instruction: &str,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse> {
        if let Some(results) = conversation.last_tool_results() {
            return Ok(ModelResponse::FinalText(Self::summarize(results)));
        }

        let question = conversation.first_user_text().unwrap_or_default();
        if !tools.iter().any(|t| t.name == SQL_TOOL_NAME) {
            return Ok(ModelResponse::FinalText(format!(
                "No data tools are available to answer: {question}"
            )));
        }

        let mut arguments = Map::new();
        arguments.insert("query".to_string(), json!(self.sql_for(question)));
        Ok(ModelResponse::ToolCalls(vec![ToolCall::new(
            SQL_TOOL_NAME,
            arguments,
        )]))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// Model double that replays a script of responses.
///
/// Every invocation records the system instruction and conversation it was
/// given. Once the script runs out, further calls fail.
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<ModelResponse>>>,
    conversations: Mutex<Vec<Conversation>>,
    instructions: Mutex<Vec<String>>,
}

impl ScriptedLlmClient {
    /// Creates a client that replays `script` in order.
    pub fn new(script: Vec<Result<ModelResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    /// Appends a final text response.
    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.push(Ok(ModelResponse::FinalText(text.into())))
    }

    /// Appends a response calling the SQL tool with `sql`.
    pub fn then_sql(self, sql: impl Into<String>) -> Self {
        let mut arguments = Map::new();
        arguments.insert("query".to_string(), JsonValue::String(sql.into()));
        self.push(Ok(ModelResponse::ToolCalls(vec![ToolCall::new(
            SQL_TOOL_NAME,
            arguments,
        )])))
    }

    /// Appends an arbitrary tool-call response.
    pub fn then_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        self.push(Ok(ModelResponse::ToolCalls(calls)))
    }

    /// Appends a failed invocation.
    pub fn then_error(self, error: ServiceError) -> Self {
        self.push(Err(error))
    }

    /// Number of times `generate` was called.
    pub fn call_count(&self) -> usize {
        lock(&self.conversations).len()
    }

    /// Conversations seen so far, one per call.
    pub fn conversations(&self) -> Vec<Conversation> {
        lock(&self.conversations).clone()
    }

    /// System instructions seen so far, one per call.
    pub fn instructions(&self) -> Vec<String> {
        lock(&self.instructions).clone()
    }

    fn push(self, entry: Result<ModelResponse>) -> Self {
        lock(&self.script).push_back(entry);
        self
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn generate(
        &self,
        system_instruction: &str,
        conversation: &Conversation,
        _tools: &[ToolDefinition],
    ) -> Result<ModelResponse> {
        lock(&self.conversations).push(conversation.clone());
        lock(&self.instructions).push(system_instruction.to_string());

        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::llm("Scripted client has no more responses")))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
