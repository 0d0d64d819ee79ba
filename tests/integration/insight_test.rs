//! Tool-call loop tests.
//!
//! Drive the insight generator with scripted model responses and check what
//! reaches the store and what the caller gets back.

use async_trait::async_trait;
use serde_json::Map;
use std::sync::Arc;
use std::time::Duration;

use samarth::analytics::{
    InsightGenerator, InsightSource, CREDENTIAL_ERROR_MESSAGE, INCOMPLETE_ANALYSIS_MESSAGE,
    TIMEOUT_MESSAGE, UNAVAILABLE_MESSAGE,
};
use samarth::config::DatabaseConfig;
use samarth::db::{DatabaseClient, MockDatabaseClient, SqliteClient};
use samarth::error::{Result, ServiceError};
use samarth::llm::{
    Conversation, LlmClient, MockLlmClient, ModelResponse, ScriptedLlmClient, ToolCall,
    ToolDefinition,
};

const PUNJAB_QUESTION: &str = "What is the correlation between rainfall and crop yield in Punjab?";

/// Builds a generator over a scripted model and the mock store.
fn scripted(
    script: ScriptedLlmClient,
) -> (InsightGenerator, Arc<ScriptedLlmClient>, Arc<MockDatabaseClient>) {
    let client = Arc::new(script);
    let db = Arc::new(MockDatabaseClient::with_demo_data());
    let generator = InsightGenerator::new(
        Some(Arc::clone(&client) as Arc<dyn LlmClient>),
        Arc::clone(&db) as Arc<dyn DatabaseClient>,
    );
    (generator, client, db)
}

/// Model that never answers in time.
struct StalledClient;

#[async_trait]
impl LlmClient for StalledClient {
    async fn generate(
        &self,
        _system_instruction: &str,
        _conversation: &Conversation,
        _tools: &[ToolDefinition],
    ) -> Result<ModelResponse> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(ModelResponse::FinalText("too late".to_string()))
    }

    fn model_name(&self) -> &str {
        "stalled"
    }
}

#[tokio::test]
async fn test_unavailable_client_returns_advisory() {
    let db = Arc::new(MockDatabaseClient::with_demo_data());
    let generator = InsightGenerator::new(None, db.clone());

    let text = generator.generate_insights(PUNJAB_QUESTION, None).await;
    let text = tokio_test::assert_ok!(text);

    assert_eq!(text, UNAVAILABLE_MESSAGE);
    assert!(db.executed_queries().is_empty());
}

#[tokio::test]
async fn test_tool_call_then_text_executes_once() {
    let (generator, client, db) = scripted(
        ScriptedLlmClient::default()
            .then_sql("SELECT state, year, annual_rainfall_mm FROM rainfall WHERE state = 'Punjab'")
            .then_text("Punjab rainfall averaged 572 mm."),
    );

    let text = generator.generate_insights(PUNJAB_QUESTION, None).await.unwrap();

    assert_eq!(text, "Punjab rainfall averaged 572 mm.");
    assert_eq!(db.executed_queries().len(), 1);
    assert_eq!(client.call_count(), 2);

    // The second invocation sees the rows from the first.
    let second = &client.conversations()[1];
    let results = second.last_tool_results().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "execute_sql_query");
    assert_eq!(results[0].content["row_count"], 5);
    assert_eq!(results[0].content["rows"][0]["state"], "Punjab");
}

#[tokio::test]
async fn test_text_without_tool_call_executes_nothing() {
    let (generator, client, db) =
        scripted(ScriptedLlmClient::default().then_text("No data needed."));

    let text = generator.generate_insights(PUNJAB_QUESTION, None).await.unwrap();

    assert_eq!(text, "No data needed.");
    assert!(db.executed_queries().is_empty());
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn test_credential_error_message() {
    let (generator, _, _) = scripted(ScriptedLlmClient::default().then_error(ServiceError::llm(
        "Authentication failed. Check your GEMINI_API_KEY.",
    )));

    let text = generator.generate_insights(PUNJAB_QUESTION, None).await.unwrap();
    assert_eq!(text, CREDENTIAL_ERROR_MESSAGE);
}

#[tokio::test]
async fn test_generic_error_message_includes_cause() {
    let (generator, _, _) = scripted(
        ScriptedLlmClient::default().then_error(ServiceError::llm("Service overloaded (503)")),
    );

    let text = generator.generate_insights(PUNJAB_QUESTION, None).await.unwrap();
    assert!(text.starts_with("Error: Unable to generate insights."));
    assert!(text.contains("Service overloaded (503)"));
}

#[tokio::test]
async fn test_round_cap_yields_incomplete_message() {
    let (generator, client, db) = scripted(
        ScriptedLlmClient::default()
            .then_sql("SELECT * FROM rainfall")
            .then_sql("SELECT * FROM rainfall")
            .then_sql("SELECT * FROM rainfall")
            .then_text("never reached"),
    );
    let generator = generator.with_max_tool_rounds(2);

    let text = generator.generate_insights(PUNJAB_QUESTION, None).await.unwrap();

    assert_eq!(text, INCOMPLETE_ANALYSIS_MESSAGE);
    assert_eq!(db.executed_queries().len(), 2);
    assert_eq!(client.call_count(), 3);
}

#[tokio::test]
async fn test_write_statement_is_rejected() {
    let (generator, client, db) = scripted(
        ScriptedLlmClient::default()
            .then_sql("DELETE FROM rainfall WHERE state = 'Punjab'")
            .then_text("I cannot modify data."),
    );

    let text = generator.generate_insights(PUNJAB_QUESTION, None).await.unwrap();
    assert_eq!(text, "I cannot modify data.");
    assert!(db.executed_queries().is_empty());

    let results = client.conversations()[1].last_tool_results().unwrap().to_vec();
    let error = results[0].content["error"].as_str().unwrap();
    assert!(error.contains("read-only"));
}

#[tokio::test]
async fn test_unknown_tool_and_missing_argument_get_errors() {
    let mut args = Map::new();
    args.insert("path".to_string(), "/etc/passwd".into());
    let (generator, client, db) = scripted(
        ScriptedLlmClient::default()
            .then_tool_calls(vec![
                ToolCall::new("read_file", args),
                ToolCall::new("execute_sql_query", Map::new()),
            ])
            .then_text("Done."),
    );

    generator.generate_insights(PUNJAB_QUESTION, None).await.unwrap();

    assert!(db.executed_queries().is_empty());
    let results = client.conversations()[1].last_tool_results().unwrap().to_vec();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_error()));
    assert_eq!(results[0].name, "read_file");
}

#[tokio::test]
async fn test_store_failure_stops_before_model_call() {
    let client = Arc::new(
        ScriptedLlmClient::default()
            .then_sql("SELECT 1")
            .then_text("The database is down."),
    );
    // Schema introspection fails first, so the model is never called.
    let generator = InsightGenerator::new(
        Some(client.clone() as Arc<dyn LlmClient>),
        Arc::new(MockDatabaseClient::failing("connection refused")),
    );

    let text = generator.generate_insights(PUNJAB_QUESTION, None).await.unwrap();
    assert!(text.starts_with("Error: Unable to generate insights."));
    assert!(text.contains("connection refused"));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_request_timeout() {
    let generator = InsightGenerator::new(
        Some(Arc::new(StalledClient)),
        Arc::new(MockDatabaseClient::with_demo_data()),
    )
    .with_request_timeout(Duration::from_millis(50));

    let text = generator.generate_insights(PUNJAB_QUESTION, None).await.unwrap();
    assert_eq!(text, TIMEOUT_MESSAGE);
}

#[tokio::test]
async fn test_punjab_round_trip_against_sqlite() {
    let db = SqliteClient::connect(&DatabaseConfig::default()).await.unwrap();
    let db: Arc<dyn DatabaseClient> = Arc::new(db);
    let generator = InsightGenerator::new(Some(Arc::new(MockLlmClient::new())), Arc::clone(&db));

    let text = generator.generate_insights(PUNJAB_QUESTION, None).await.unwrap();

    assert!(!text.is_empty());
    assert!(text.contains("Punjab"));
    assert!(!text.contains("could not be run"));

    db.close().await.unwrap();
}
