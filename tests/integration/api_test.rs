//! HTTP API tests.
//!
//! Requests go straight through the router with `tower::ServiceExt::oneshot`;
//! no socket is opened.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Map, Value as JsonValue};
use std::sync::Arc;
use tower::ServiceExt;

use samarth::analytics::{
    InsightGenerator, InsightSource, QueryHistory, QueryOrchestrator, UNAVAILABLE_MESSAGE,
};
use samarth::api::{create_router, AppState};
use samarth::config::ServerConfig;
use samarth::db::{DatabaseClient, MockDatabaseClient};
use samarth::error::{Result, ServiceError};
use samarth::llm::{LlmClient, MockLlmClient};

/// Source whose failures reach the HTTP layer.
struct BrokenSource;

#[async_trait]
impl InsightSource for BrokenSource {
    async fn generate_insights(
        &self,
        _query: &str,
        _context: Option<&Map<String, JsonValue>>,
    ) -> Result<String> {
        Err(ServiceError::internal("token sk-live-123 leaked in trace"))
    }

    fn is_available(&self) -> bool {
        true
    }
}

fn app_with(source: Arc<dyn InsightSource>) -> Router {
    let database: Arc<dyn DatabaseClient> = Arc::new(MockDatabaseClient::with_demo_data());
    let state = AppState::new(
        QueryOrchestrator::new(source),
        Arc::new(QueryHistory::new(50)),
        database,
    );
    create_router(state, &ServerConfig::default())
}

fn app(client: Option<Arc<dyn LlmClient>>) -> Router {
    let database: Arc<dyn DatabaseClient> = Arc::new(MockDatabaseClient::with_demo_data());
    let generator = InsightGenerator::new(client, database);
    app_with(Arc::new(generator))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
    (status, json)
}

#[tokio::test]
async fn test_root_reports_service_info() {
    let app = app(None);
    let (status, body) = send(&app, Method::GET, "/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "Project Samarth API");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["docs"].is_object());
}

#[tokio::test]
async fn test_health_degraded_without_model() {
    let app = app(None);
    let (status, body) = send(&app, Method::GET, "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["api"], "operational");
    assert_eq!(body["services"]["ai_service"], "unavailable (Check GEMINI_API_KEY)");
    assert_eq!(body["services"]["database"], "mocked");
}

#[tokio::test]
async fn test_health_healthy_with_model() {
    let app = app(Some(Arc::new(MockLlmClient::new())));
    let (_, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["ai_service"], "operational");
}

#[tokio::test]
async fn test_query_round_trip_and_history() {
    let app = app(Some(Arc::new(MockLlmClient::new())));
    let question = "Show wheat production in Punjab over the years";

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/analytics/query",
        Some(json!({ "query": question, "filters": {"crop": "Wheat"} })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], question);
    assert!(body["insights"].as_str().unwrap().contains("Punjab"));
    assert_eq!(body["data_points"], JsonValue::Null);
    assert!(body["execution_time"].as_f64().unwrap() >= 0.0);
    let query_id = body["query_id"].as_str().unwrap().to_string();

    let (status, history) = send(&app, Method::GET, "/api/analytics/history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["success"], true);
    assert_eq!(history["total"], 1);
    assert_eq!(history["total_recorded"], 1);
    assert_eq!(history["data"][0]["query_id"], query_id.as_str());
}

#[tokio::test]
async fn test_history_limit_returns_newest() {
    let app = app(None);
    for n in 0..3 {
        let query = format!("Question about rainfall {n}");
        let (status, _) =
            send(&app, Method::POST, "/analytics/query", Some(json!({ "query": query }))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, history) = send(&app, Method::GET, "/analytics/history?limit=2", None).await;
    let data = history["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["query"], "Question about rainfall 1");
    assert_eq!(data[1]["query"], "Question about rainfall 2");
    assert_eq!(data[1]["insights"], UNAVAILABLE_MESSAGE);
    assert_eq!(history["total"], 3);

    let (_, everything) = send(&app, Method::GET, "/analytics/history?limit=0", None).await;
    assert_eq!(everything["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_short_query_is_422() {
    let app = app(None);
    let (status, body) =
        send(&app, Method::POST, "/analytics/query", Some(json!({ "query": "rain" }))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("at least 10"));
}

#[tokio::test]
async fn test_malformed_body_is_422() {
    let app = app(None);
    let (status, body) =
        send(&app, Method::POST, "/analytics/query", Some(json!({ "question": 42 }))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_internal_failure_is_redacted_500() {
    let app = app_with(Arc::new(BrokenSource));
    let (status, body) = send(
        &app,
        Method::POST,
        "/analytics/query",
        Some(json!({ "query": "Wheat production in Punjab" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Internal Server Error (reference: "));
    assert!(!detail.contains("sk-live-123"));

    // Failed queries are not recorded.
    let (_, history) = send(&app, Method::GET, "/analytics/history", None).await;
    assert_eq!(history["total"], 0);
}

#[tokio::test]
async fn test_feedback() {
    let app = app(None);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/analytics/feedback",
        Some(json!({ "query_id": "abc", "rating": 4, "feedback": "Useful" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Feedback submitted successfully");
    assert_eq!(body["data"], json!({ "query_id": "abc", "rating": 4 }));

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/analytics/feedback",
        Some(json!({ "query_id": "abc", "rating": 6 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
