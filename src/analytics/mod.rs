//! Analytics pipeline: request models, insight generation, orchestration and
//! the in-process result history.

pub mod history;
pub mod insight;
pub mod models;
pub mod orchestrator;

pub use history::QueryHistory;
pub use insight::{
    error_message, InsightGenerator, InsightSource, CREDENTIAL_ERROR_MESSAGE,
    INCOMPLETE_ANALYSIS_MESSAGE, TIMEOUT_MESSAGE, UNAVAILABLE_MESSAGE,
};
pub use models::{
    AnalyticsQuery, AnalyticsResult, ApiResponse, HealthResponse, QueryFeedback, MAX_QUERY_CHARS,
    MIN_QUERY_CHARS,
};
pub use orchestrator::QueryOrchestrator;
