//! Orchestrator round-trip tests.

use std::sync::Arc;
use uuid::Uuid;

use samarth::analytics::{
    AnalyticsQuery, InsightGenerator, QueryHistory, QueryOrchestrator, UNAVAILABLE_MESSAGE,
};
use samarth::db::MockDatabaseClient;
use samarth::llm::{LlmClient, ScriptedLlmClient};

const PUNJAB_QUESTION: &str = "What is the correlation between rainfall and crop yield in Punjab?";

fn orchestrator(client: Option<Arc<dyn LlmClient>>) -> QueryOrchestrator {
    let generator = InsightGenerator::new(client, Arc::new(MockDatabaseClient::with_demo_data()));
    QueryOrchestrator::new(Arc::new(generator))
}

#[tokio::test]
async fn test_punjab_round_trip() {
    let client = Arc::new(
        ScriptedLlmClient::default()
            .then_sql(
                "SELECT c.year, AVG(c.yield_tonnes_per_hectare), r.annual_rainfall_mm \
                 FROM crop_production c JOIN rainfall r ON c.state = r.state AND c.year = r.year \
                 WHERE c.state = 'Punjab' GROUP BY c.year, r.annual_rainfall_mm",
            )
            .then_text("## Rainfall and yield in Punjab\n- Yields held steady as rainfall fell."),
    );
    let orchestrator = orchestrator(Some(client.clone() as Arc<dyn LlmClient>));

    let result = orchestrator
        .process_query(&AnalyticsQuery::new(PUNJAB_QUESTION))
        .await
        .unwrap();

    assert_eq!(result.query, PUNJAB_QUESTION);
    assert!(result.insights.contains("Rainfall and yield in Punjab"));
    assert!(Uuid::parse_str(&result.query_id).is_ok());
    assert!(result.execution_time >= 0.0);
    assert!(result.data_points.is_none());
    assert_eq!(client.call_count(), 2);
}

#[tokio::test]
async fn test_unavailable_model_still_produces_result() {
    let orchestrator = orchestrator(None);
    assert!(!orchestrator.is_ai_available());

    let result = orchestrator
        .process_query(&AnalyticsQuery::new("Average wheat yield in Haryana"))
        .await
        .unwrap();

    assert_eq!(result.insights, UNAVAILABLE_MESSAGE);
    assert!(!result.query_id.is_empty());
}

#[tokio::test]
async fn test_length_bounds_are_enforced() {
    let orchestrator = orchestrator(None);

    let too_short = orchestrator.process_query(&AnalyticsQuery::new("rain?")).await;
    assert!(too_short.unwrap_err().is_client_error());

    let too_long = orchestrator
        .process_query(&AnalyticsQuery::new("x".repeat(1001)))
        .await;
    assert!(too_long.unwrap_err().is_client_error());

    let longest = orchestrator
        .process_query(&AnalyticsQuery::new("x".repeat(1000)))
        .await;
    assert!(longest.is_ok());
}

#[tokio::test]
async fn test_results_feed_history() {
    let orchestrator = orchestrator(None);
    let history = QueryHistory::new(2);

    for question in [
        "Wheat production in Punjab",
        "Rice production in Haryana",
        "Jowar production in Maharashtra",
    ] {
        let result = orchestrator
            .process_query(&AnalyticsQuery::new(question))
            .await
            .unwrap();
        history.record(result).await;
    }

    let recent = history.recent(10).await;
    let queries: Vec<&str> = recent.iter().map(|r| r.query.as_str()).collect();
    assert_eq!(
        queries,
        vec!["Rice production in Haryana", "Jowar production in Maharashtra"]
    );
    assert_eq!(history.total_recorded().await, 3);
}
