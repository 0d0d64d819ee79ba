//! Insight generation: the model/tool-call loop.
//!
//! The generator sends the question to the model together with the SQL tool,
//! executes whatever queries the model asks for, feeds the rows back and
//! returns the model's final text. Failures never escape as errors; they
//! become fixed user-facing messages.

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::{AnalyticsConfig, DatabaseConfig};
use crate::db::DatabaseClient;
use crate::error::{Result, ServiceError};
use crate::llm::{Conversation, LlmClient, ModelResponse, PromptCache, SqlTool};

/// Returned when no model client could be created.
pub const UNAVAILABLE_MESSAGE: &str =
    "AI service is currently unavailable. Please check the GEMINI_API_KEY.";

/// Returned when the model rejects the configured credential.
pub const CREDENTIAL_ERROR_MESSAGE: &str =
    "Error: AI service authentication failed. Please check the GEMINI_API_KEY.";

/// Returned when the model keeps asking for tools past the round limit.
pub const INCOMPLETE_ANALYSIS_MESSAGE: &str =
    "Error: The AI service could not complete the analysis. Please try a more specific question.";

/// Returned when the whole analysis exceeds its time budget.
pub const TIMEOUT_MESSAGE: &str =
    "Error: The analysis timed out. Please try again with a simpler question.";

/// Prefix of the generic failure message.
const GENERIC_ERROR_PREFIX: &str = "Error: Unable to generate insights.";

/// Substring that marks a credential failure in error text.
const CREDENTIAL_MARKER: &str = "API_KEY";

/// Something that can answer an analytics question with text.
#[async_trait]
pub trait InsightSource: Send + Sync {
    /// Produces insights for `query`, optionally guided by `context`.
    async fn generate_insights(
        &self,
        query: &str,
        context: Option<&Map<String, JsonValue>>,
    ) -> Result<String>;

    /// Returns true if a model is configured.
    fn is_available(&self) -> bool;
}

/// Insight source backed by a model client and the SQL tool.
pub struct InsightGenerator {
    client: Option<Arc<dyn LlmClient>>,
    database: Arc<dyn DatabaseClient>,
    sql_tool: SqlTool,
    prompt_cache: Mutex<PromptCache>,
    max_tool_rounds: usize,
    request_timeout: Duration,
}

impl InsightGenerator {
    /// Creates a generator with default limits and a read-only SQL tool.
    pub fn new(client: Option<Arc<dyn LlmClient>>, database: Arc<dyn DatabaseClient>) -> Self {
        Self::from_config(
            client,
            database,
            &AnalyticsConfig::default(),
            &DatabaseConfig::default(),
        )
    }

    /// Creates a generator using the configured limits.
    pub fn from_config(
        client: Option<Arc<dyn LlmClient>>,
        database: Arc<dyn DatabaseClient>,
        analytics: &AnalyticsConfig,
        db_config: &DatabaseConfig,
    ) -> Self {
        let sql_tool = SqlTool::new(Arc::clone(&database), db_config.max_rows)
            .allow_writes(db_config.allow_writes);
        Self {
            client,
            database,
            sql_tool,
            prompt_cache: Mutex::new(PromptCache::new()),
            max_tool_rounds: analytics.max_tool_rounds,
            request_timeout: Duration::from_secs(analytics.request_timeout_secs),
        }
    }

    /// Sets the maximum number of tool-call rounds.
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Sets the time budget for one analysis.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns the model name, if a model is configured.
    pub fn model_name(&self) -> Option<&str> {
        self.client.as_deref().map(|c| c.model_name())
    }

    /// Builds the system instruction from the current schema.
    async fn system_instruction(&self) -> Result<Arc<str>> {
        let schema = self.database.introspect_schema().await?;
        let mut cache = self
            .prompt_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(cache.get_or_build(&schema))
    }

    /// Runs the model/tool loop until the model answers with text.
    async fn run(
        &self,
        client: &dyn LlmClient,
        query: &str,
        context: Option<&Map<String, JsonValue>>,
    ) -> Result<String> {
        let instruction = self.system_instruction().await?;
        let tools = [SqlTool::definition()];

        let mut conversation = Conversation::new();
        conversation.add_user(user_message(query, context));

        let mut rounds = 0;
        loop {
            let llm_start = Instant::now();
            let response = client.generate(&instruction, &conversation, &tools).await?;
            debug!(
                round = rounds,
                llm_duration_ms = llm_start.elapsed().as_millis() as u64,
                "Received model response"
            );

            let calls = match response {
                ModelResponse::FinalText(text) => return Ok(text),
                ModelResponse::ToolCalls(calls) => calls,
            };

            if rounds >= self.max_tool_rounds {
                warn!(
                    max_tool_rounds = self.max_tool_rounds,
                    "Model exceeded the tool-call round limit"
                );
                return Ok(INCOMPLETE_ANALYSIS_MESSAGE.to_string());
            }
            rounds += 1;

            debug!(round = rounds, tool_count = calls.len(), "Processing tool calls");
            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                results.push(self.sql_tool.handle(call).await);
            }

            conversation.add_tool_calls(calls);
            conversation.add_tool_results(results);
        }
    }
}

#[async_trait]
impl InsightSource for InsightGenerator {
    async fn generate_insights(
        &self,
        query: &str,
        context: Option<&Map<String, JsonValue>>,
    ) -> Result<String> {
        let Some(client) = self.client.as_deref() else {
            warn!("Insight requested but no model client is configured");
            return Ok(UNAVAILABLE_MESSAGE.to_string());
        };

        let start = Instant::now();
        let outcome =
            tokio::time::timeout(self.request_timeout, self.run(client, query, context)).await;

        let text = match outcome {
            Ok(Ok(text)) => {
                info!(
                    model = client.model_name(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    insight_len = text.len(),
                    "Generated insights"
                );
                text
            }
            Ok(Err(e)) => {
                error!(error = %e, "Error generating insights");
                error_message(&e)
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.request_timeout.as_secs(),
                    "Insight generation timed out"
                );
                TIMEOUT_MESSAGE.to_string()
            }
        };
        Ok(text)
    }

    fn is_available(&self) -> bool {
        self.client.is_some()
    }
}

/// Converts a loop failure into the message shown to the caller.
pub fn error_message(err: &ServiceError) -> String {
    let text = err.to_string();
    if text.contains(CREDENTIAL_MARKER) {
        CREDENTIAL_ERROR_MESSAGE.to_string()
    } else {
        format!("{} {}", GENERIC_ERROR_PREFIX, text)
    }
}

fn user_message(query: &str, context: Option<&Map<String, JsonValue>>) -> String {
    match context.filter(|c| !c.is_empty()) {
        Some(context) => format!(
            "{}\n\nAdditional context: {}",
            query,
            JsonValue::Object(context.clone())
        ),
        None => query.to_string(),
    }
}
