//! Query orchestration.
//!
//! Wraps an insight source with validation, identifiers and timing.

use chrono::Utc;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::insight::InsightSource;
use super::models::{round_seconds, AnalyticsQuery, AnalyticsResult};
use crate::error::Result;

/// Turns validated queries into timestamped results.
#[derive(Clone)]
pub struct QueryOrchestrator {
    source: Arc<dyn InsightSource>,
}

impl QueryOrchestrator {
    /// Creates an orchestrator over `source`.
    pub fn new(source: Arc<dyn InsightSource>) -> Self {
        Self { source }
    }

    /// Returns true if the underlying insight source has a model.
    pub fn is_ai_available(&self) -> bool {
        self.source.is_available()
    }

    /// Processes one analytics query.
    ///
    /// Fails with a validation error if the query length is out of range.
    /// Errors from the insight source are logged with the query id and
    /// propagated unchanged.
    pub async fn process_query(&self, request: &AnalyticsQuery) -> Result<AnalyticsResult> {
        request.validate()?;

        let query_id = Uuid::new_v4().to_string();
        let start = Instant::now();
        info!(
            query_id = %query_id,
            query_len = request.query.chars().count(),
            has_context = request.context.is_some(),
            "Processing analytics query"
        );

        if let Some(filters) = &request.filters {
            debug!(
                query_id = %query_id,
                filters = %JsonValue::Object(filters.clone()),
                "Filters supplied but not applied"
            );
        }

        let insights = self
            .source
            .generate_insights(&request.query, request.context.as_ref())
            .await
            .map_err(|e| {
                error!(query_id = %query_id, error = %e, "Error processing query");
                e
            })?;

        let execution_time = round_seconds(start.elapsed().as_secs_f64());
        info!(
            query_id = %query_id,
            execution_time,
            "Query processed"
        );

        Ok(AnalyticsResult {
            query_id,
            query: request.query.clone(),
            insights,
            data_points: None,
            execution_time,
            timestamp: Utc::now(),
        })
    }
}
