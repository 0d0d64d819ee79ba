//! Integration tests for Samarth.

pub mod api_test;
pub mod insight_test;
pub mod orchestrator_test;
pub mod sqlite_test;
