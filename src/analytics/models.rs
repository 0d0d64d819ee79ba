//! Request and response models for the analytics API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

use crate::error::{Result, ServiceError};

/// Minimum query length in characters.
pub const MIN_QUERY_CHARS: usize = 10;

/// Maximum query length in characters.
pub const MAX_QUERY_CHARS: usize = 1000;

/// A natural-language analytics question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsQuery {
    /// The question, 10 to 1000 characters.
    pub query: String,

    /// Optional extra context passed to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, JsonValue>>,

    /// Optional filters. Accepted and logged, not applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Map<String, JsonValue>>,
}

impl AnalyticsQuery {
    /// Creates a query with no context or filters.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context: None,
            filters: None,
        }
    }

    /// Attaches a context map.
    pub fn with_context(mut self, context: Map<String, JsonValue>) -> Self {
        self.context = Some(context);
        self
    }

    /// Checks the query length, counted in characters rather than bytes.
    pub fn validate(&self) -> Result<()> {
        let chars = self.query.chars().count();
        if chars < MIN_QUERY_CHARS {
            return Err(ServiceError::validation(format!(
                "Query must be at least {} characters (got {})",
                MIN_QUERY_CHARS, chars
            )));
        }
        if chars > MAX_QUERY_CHARS {
            return Err(ServiceError::validation(format!(
                "Query must be at most {} characters (got {})",
                MAX_QUERY_CHARS, chars
            )));
        }
        Ok(())
    }
}

/// User feedback on a previous answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFeedback {
    pub query_id: String,
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl QueryFeedback {
    /// Checks that the rating is between 1 and 5.
    pub fn validate(&self) -> Result<()> {
        if !(1..=5).contains(&self.rating) {
            return Err(ServiceError::validation(format!(
                "Rating must be between 1 and 5 (got {})",
                self.rating
            )));
        }
        Ok(())
    }
}

/// The answer to an analytics query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsResult {
    pub query_id: String,
    pub query: String,
    pub insights: String,
    /// Reserved; always `null`.
    pub data_points: Option<Vec<Map<String, JsonValue>>>,
    /// Seconds, rounded to two decimals.
    pub execution_time: f64,
    pub timestamp: DateTime<Utc>,
}

/// Generic envelope for non-query endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    pub timestamp: DateTime<Utc>,
}

impl ApiResponse {
    /// Creates a successful response with a message and no data.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }

    /// Attaches a data payload.
    pub fn with_data(mut self, data: JsonValue) -> Self {
        self.data = Some(data);
        self
    }
}

/// Service health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

/// Rounds seconds to two decimals.
pub fn round_seconds(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_query_length_bounds() {
        assert!(AnalyticsQuery::new("a".repeat(9)).validate().is_err());
        assert!(AnalyticsQuery::new("a".repeat(10)).validate().is_ok());
        assert!(AnalyticsQuery::new("a".repeat(1000)).validate().is_ok());
        assert!(AnalyticsQuery::new("a".repeat(1001)).validate().is_err());
    }

    #[test]
    fn test_query_length_counts_characters() {
        let short = AnalyticsQuery::new("ज्वार");
        assert!(short.query.len() >= MIN_QUERY_CHARS);
        assert!(short.validate().is_err());

        let multi_byte = AnalyticsQuery::new("é".repeat(1000));
        assert!(multi_byte.query.len() > MAX_QUERY_CHARS);
        assert!(multi_byte.validate().is_ok());
    }

    #[test]
    fn test_query_validation_error_is_client_error() {
        let err = AnalyticsQuery::new("short").validate().unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("at least 10"));
    }

    #[test]
    fn test_query_deserializes_optional_maps() {
        let query: AnalyticsQuery = serde_json::from_value(json!({
            "query": "Rice production in Karnataka",
            "context": {"season": "kharif"}
        }))
        .unwrap();

        assert_eq!(query.query, "Rice production in Karnataka");
        assert_eq!(query.context.unwrap()["season"], "kharif");
        assert!(query.filters.is_none());
    }

    #[test]
    fn test_feedback_rating_range() {
        let mut feedback = QueryFeedback {
            query_id: "abc".to_string(),
            rating: 0,
            feedback: None,
        };
        assert!(feedback.validate().is_err());
        feedback.rating = 1;
        assert!(feedback.validate().is_ok());
        feedback.rating = 5;
        assert!(feedback.validate().is_ok());
        feedback.rating = 6;
        assert!(feedback.validate().is_err());
    }

    #[test]
    fn test_result_serializes_null_data_points() {
        let result = AnalyticsResult {
            query_id: "id".to_string(),
            query: "Wheat output in Punjab".to_string(),
            insights: "Rose.".to_string(),
            data_points: None,
            execution_time: 1.25,
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["data_points"], JsonValue::Null);
        assert_eq!(value["execution_time"], json!(1.25));
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_round_seconds() {
        assert_eq!(round_seconds(1.234), 1.23);
        assert_eq!(round_seconds(0.006), 0.01);
        assert_eq!(round_seconds(0.0), 0.0);
    }
}
