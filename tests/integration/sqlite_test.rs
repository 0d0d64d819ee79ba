//! SQL tool tests against a seeded in-memory SQLite store.

use std::sync::Arc;

use samarth::config::DatabaseConfig;
use samarth::db::{self, DatabaseBackend, DatabaseClient};
use samarth::llm::SqlTool;

async fn seeded_store() -> Arc<dyn DatabaseClient> {
    db::connect(&DatabaseConfig::default()).await.unwrap()
}

async fn rainfall_rows(store: &Arc<dyn DatabaseClient>) -> i64 {
    let result = store
        .execute_query("SELECT COUNT(*) AS n FROM rainfall")
        .await
        .unwrap();
    match &result.rows[0][0] {
        db::Value::Int(n) => *n,
        other => panic!("unexpected count {:?}", other),
    }
}

#[tokio::test]
async fn test_connect_selects_sqlite_backend() {
    let store = seeded_store().await;

    assert_eq!(store.backend(), DatabaseBackend::Sqlite);
    store.health_check().await.unwrap();

    let schema = store.introspect_schema().await.unwrap();
    let names: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
    assert!(names.contains(&"crop_production"));
    assert!(names.contains(&"rainfall"));

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_tool_runs_join_over_demo_data() {
    let store = seeded_store().await;
    let tool = SqlTool::new(Arc::clone(&store), 100);

    let output = tool
        .execute(
            "SELECT c.year, c.yield_tonnes_per_hectare, r.annual_rainfall_mm \
             FROM crop_production c JOIN rainfall r ON c.state = r.state AND c.year = r.year \
             WHERE c.state = 'Punjab' AND c.crop = 'Wheat' ORDER BY c.year",
        )
        .await;

    assert!(output.get("error").is_none(), "unexpected error: {}", output);
    assert_eq!(output["row_count"], 5);
    assert_eq!(
        output["columns"],
        serde_json::json!(["year", "yield_tonnes_per_hectare", "annual_rainfall_mm"])
    );
    assert_eq!(output["rows"][0]["year"], 2018);
    assert_eq!(output["rows"][0]["annual_rainfall_mm"], 639.0);
    assert_eq!(output["truncated"], false);
}

#[tokio::test]
async fn test_tool_truncates_to_max_rows() {
    let store = seeded_store().await;
    let tool = SqlTool::new(store, 3);

    let output = tool.execute("SELECT * FROM crop_production").await;

    assert_eq!(output["row_count"], 3);
    assert_eq!(output["rows"].as_array().unwrap().len(), 3);
    assert_eq!(output["truncated"], true);
}

#[tokio::test]
async fn test_tool_rejects_writes_by_default() {
    let store = seeded_store().await;
    let before = rainfall_rows(&store).await;
    let tool = SqlTool::new(Arc::clone(&store), 100);

    for sql in [
        "DELETE FROM rainfall",
        "DROP TABLE rainfall",
        "INSERT INTO rainfall (state, year, annual_rainfall_mm) VALUES ('Kerala', 2021, 3000)",
        "UPDATE rainfall SET annual_rainfall_mm = 0",
    ] {
        let output = tool.execute(sql).await;
        assert!(output["error"].is_string(), "{} was not rejected", sql);
    }

    assert_eq!(rainfall_rows(&store).await, before);
}

#[tokio::test]
async fn test_tool_allows_writes_when_enabled() {
    let store = seeded_store().await;
    let before = rainfall_rows(&store).await;
    let tool = SqlTool::new(Arc::clone(&store), 100).allow_writes(true);

    let output = tool
        .execute("INSERT INTO rainfall (state, year, annual_rainfall_mm) VALUES ('Kerala', 2021, 3000)")
        .await;
    assert!(output.get("error").is_none(), "unexpected error: {}", output);

    assert_eq!(rainfall_rows(&store).await, before + 1);
}

#[tokio::test]
async fn test_tool_rejects_multiple_statements() {
    let store = seeded_store().await;
    let tool = SqlTool::new(store, 100).allow_writes(true);

    let output = tool
        .execute("SELECT * FROM rainfall; SELECT * FROM crop_production")
        .await;
    assert!(output["error"].as_str().unwrap().contains("one SQL statement"));
}

#[tokio::test]
async fn test_store_errors_are_returned_as_json() {
    let store = seeded_store().await;
    let tool = SqlTool::new(store, 100);

    let output = tool.execute("SELECT monsoon FROM rainfall").await;
    let error = output["error"].as_str().unwrap();
    assert!(error.contains("monsoon"), "unexpected error: {}", error);
}
