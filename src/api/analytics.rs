//! Analytics endpoints: query, history and feedback.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use super::error::ApiError;
use super::AppState;
use crate::analytics::{AnalyticsQuery, AnalyticsResult, ApiResponse, QueryFeedback};

/// Default number of history entries returned.
const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// `POST /analytics/query`
pub async fn execute_query(
    State(state): State<AppState>,
    payload: Result<Json<AnalyticsQuery>, JsonRejection>,
) -> Result<Json<AnalyticsResult>, ApiError> {
    let Json(request) = payload?;
    let result = state.orchestrator.process_query(&request).await?;
    state.history.record(result.clone()).await;
    Ok(Json(result))
}

/// `GET /analytics/history?limit=N`
pub async fn query_history(
    State(state): State<AppState>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<JsonValue>, ApiError> {
    let Query(params) = params?;
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

    let data = state.history.recent(limit).await;
    Ok(Json(json!({
        "success": true,
        "data": data,
        "total": state.history.len().await,
        "total_recorded": state.history.total_recorded().await,
    })))
}

/// `POST /analytics/feedback`
pub async fn submit_feedback(
    payload: Result<Json<QueryFeedback>, JsonRejection>,
) -> Result<Json<ApiResponse>, ApiError> {
    let Json(feedback) = payload?;
    feedback.validate()?;

    info!(
        query_id = %feedback.query_id,
        rating = feedback.rating,
        has_comment = feedback.feedback.is_some(),
        "Received feedback"
    );
    Ok(Json(
        ApiResponse::ok("Feedback submitted successfully").with_data(json!({
            "query_id": feedback.query_id,
            "rating": feedback.rating,
        })),
    ))
}
