//! Service info and health endpoints.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use tracing::warn;

use super::AppState;
use crate::analytics::HealthResponse;
use crate::db::DatabaseBackend;

pub const SERVICE_NAME: &str = "Project Samarth API";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const OPERATIONAL: &str = "operational";
const AI_UNAVAILABLE: &str = "unavailable (Check GEMINI_API_KEY)";
const DB_MOCKED: &str = "mocked";
const DB_UNAVAILABLE: &str = "unavailable";

/// `GET /`
pub async fn root() -> Json<JsonValue> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": VERSION,
        "status": OPERATIONAL,
        "docs": {
            "health": "GET /health",
            "query": "POST /analytics/query",
            "history": "GET /analytics/history?limit=N",
            "feedback": "POST /analytics/feedback",
        },
    }))
}

/// `GET /health`
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ai_available = state.orchestrator.is_ai_available();

    let database = match state.database.backend() {
        DatabaseBackend::Mock => DB_MOCKED,
        _ => match state.database.health_check().await {
            Ok(()) => OPERATIONAL,
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                DB_UNAVAILABLE
            }
        },
    };

    let status = if ai_available && database != DB_UNAVAILABLE {
        "healthy"
    } else {
        "degraded"
    };

    let mut services = BTreeMap::new();
    services.insert("api".to_string(), OPERATIONAL.to_string());
    services.insert(
        "ai_service".to_string(),
        if ai_available { OPERATIONAL } else { AI_UNAVAILABLE }.to_string(),
    );
    services.insert("database".to_string(), database.to_string());

    Json(HealthResponse {
        status: status.to_string(),
        version: VERSION.to_string(),
        services,
        timestamp: Utc::now(),
    })
}
