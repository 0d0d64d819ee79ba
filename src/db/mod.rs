//! Relational store abstraction for Samarth.
//!
//! Provides a trait-based interface for database operations, allowing
//! different backends (SQLite, PostgreSQL, in-memory mock) to be used
//! interchangeably by the SQL tool and the schema provider.

pub mod demo;
mod mock;
mod postgres;
mod schema;
mod sqlite;
mod types;

pub use mock::MockDatabaseClient;
pub use postgres::PostgresClient;
pub use schema::{Column, ForeignKey, Schema, Table};
pub use sqlite::SqliteClient;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::DatabaseConfig;
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use std::sync::Arc;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
    Mock,
}

impl DatabaseBackend {
    /// Returns the backend as a string for status reporting.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Mock => "mock",
        }
    }

    /// Determines the backend from a connection URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let lower = url.trim().to_lowercase();
        if lower == "mock" {
            Ok(Self::Mock)
        } else if lower.starts_with("sqlite:") {
            Ok(Self::Sqlite)
        } else if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Ok(Self::Postgres)
        } else {
            Err(ServiceError::config(format!(
                "Unsupported database URL '{}'. Expected sqlite:, postgres:// or mock",
                url.split(':').next().unwrap_or_default()
            )))
        }
    }
}

/// Creates a database client for the configured backend.
///
/// This is the central factory function for store connections.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn DatabaseClient>> {
    match DatabaseBackend::from_url(&config.url)? {
        DatabaseBackend::Sqlite => Ok(Arc::new(SqliteClient::connect(config).await?)),
        DatabaseBackend::Postgres => Ok(Arc::new(PostgresClient::connect(config).await?)),
        DatabaseBackend::Mock => Ok(Arc::new(MockDatabaseClient::with_demo_data())),
    }
}

/// Trait defining the interface for database clients.
///
/// All database operations are async and return Results with ServiceError.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Introspects the database schema, returning table and relationship information.
    async fn introspect_schema(&self) -> Result<Schema>;

    /// Executes a single SQL statement and returns the results.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Verifies the store is reachable.
    async fn health_check(&self) -> Result<()> {
        self.execute_query("SELECT 1").await.map(|_| ())
    }

    /// Returns the backend kind.
    fn backend(&self) -> DatabaseBackend;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}
