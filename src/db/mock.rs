//! Mock database client for testing.
//!
//! Serves the demo schema and answers queries from the demo rows without a
//! real database. Results can be overridden and every statement is recorded.

use super::demo::{self, SeedRow};
use super::{ColumnInfo, DatabaseBackend, DatabaseClient, QueryResult, Row, Schema, Value};
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// A mock database client that returns predefined results.
pub struct MockDatabaseClient {
    schema: Schema,
    fixed_result: Option<QueryResult>,
    failure: Option<String>,
    executed: Mutex<Vec<String>>,
}

impl MockDatabaseClient {
    /// Creates a new mock database client with an empty schema.
    pub fn new() -> Self {
        Self {
            schema: Schema::default(),
            fixed_result: None,
            failure: None,
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock that serves the demo tables.
    pub fn with_demo_data() -> Self {
        Self::with_schema(demo::demo_schema())
    }

    /// Creates a new mock database client with the given schema.
    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema,
            ..Self::new()
        }
    }

    /// Returns `result` for every SELECT instead of the demo rows.
    pub fn with_result(mut self, result: QueryResult) -> Self {
        self.fixed_result = Some(result);
        self
    }

    /// Creates a mock whose every query fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::with_demo_data()
        }
    }

    /// Returns every statement passed to `execute_query`, in order.
    pub fn executed_queries(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }

    fn demo_result(sql_lower: &str) -> QueryResult {
        if sql_lower.contains("rainfall") {
            let columns = vec![
                ColumnInfo::new("state", "TEXT"),
                ColumnInfo::new("year", "INTEGER"),
                ColumnInfo::new("annual_rainfall_mm", "REAL"),
            ];
            let rows = demo::seed_rows()
                .filter_map(|row| match row {
                    SeedRow::Rainfall {
                        state,
                        year,
                        annual_mm,
                        ..
                    } => Some(vec![Value::from(state), Value::Int(year), Value::Float(annual_mm)]),
                    SeedRow::Crop { .. } => None,
                })
                .filter(|row| matches_state(sql_lower, row))
                .collect();
            return QueryResult::with_data(columns, rows);
        }

        let columns = vec![
            ColumnInfo::new("state", "TEXT"),
            ColumnInfo::new("crop", "TEXT"),
            ColumnInfo::new("year", "INTEGER"),
            ColumnInfo::new("production_tonnes", "REAL"),
        ];
        let rows = demo::seed_rows()
            .filter_map(|row| match row {
                SeedRow::Crop {
                    state,
                    crop,
                    year,
                    production_tonnes,
                    ..
                } => Some(vec![
                    Value::from(state),
                    Value::from(crop),
                    Value::Int(year),
                    Value::Float(production_tonnes),
                ]),
                SeedRow::Rainfall { .. } => None,
            })
            .filter(|row| matches_state(sql_lower, row))
            .collect();
        QueryResult::with_data(columns, rows)
    }
}

/// Keeps rows whose state is named in the statement, or all rows if none is.
fn matches_state(sql_lower: &str, row: &Row) -> bool {
    let mentioned = |state: &str| sql_lower.contains(&format!("'{}'", state.to_lowercase()));
    let any_state_named = demo::seed_rows().any(|r| match r {
        SeedRow::Crop { state, .. } | SeedRow::Rainfall { state, .. } => mentioned(state),
    });
    match &row[0] {
        Value::String(state) => !any_state_named || mentioned(state),
        _ => true,
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        if let Some(message) = &self.failure {
            return Err(ServiceError::connection(message.clone()));
        }
        Ok(self.schema.clone())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(sql.to_string());
        }

        if let Some(message) = &self.failure {
            return Err(ServiceError::query(message.clone()));
        }

        let sql_lower = sql.trim().to_lowercase();
        let result = if !sql_lower.starts_with("select") && !sql_lower.starts_with("with") {
            QueryResult::new()
        } else if let Some(fixed) = &self.fixed_result {
            fixed.clone()
        } else if sql_lower == "select 1" {
            QueryResult::with_data(vec![ColumnInfo::new("1", "INTEGER")], vec![vec![Value::Int(1)]])
        } else {
            Self::demo_result(&sql_lower)
        };

        Ok(result.with_execution_time(Duration::from_millis(1)))
    }

    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Mock
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
