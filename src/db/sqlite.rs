//! SQLite database client implementation.
//!
//! Provides the `SqliteClient` struct that implements the `DatabaseClient` trait
//! for SQLite files and in-memory databases using sqlx. Empty stores are seeded
//! with the demo agricultural tables when configured to.

use crate::config::DatabaseConfig;
use crate::db::demo::{self, SeedRow};
use crate::db::{
    Column, ColumnInfo, DatabaseBackend, DatabaseClient, ForeignKey, QueryResult, Row, Schema,
    Table, Value,
};
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// SQLite database client.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
    query_timeout: Duration,
    max_rows: usize,
}

impl SqliteClient {
    /// Opens the database described by `config`, seeding demo data if enabled.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| ServiceError::config(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true);

        // Every pooled connection to an in-memory database sees its own empty
        // database, so memory stores get exactly one connection that never expires.
        let pool_options = if is_in_memory(&config.url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| {
                ServiceError::connection(format!(
                    "Cannot open SQLite database {}: {e}",
                    config.display_url()
                ))
            })?;

        let client = Self {
            pool,
            query_timeout: Duration::from_secs(config.query_timeout_secs),
            max_rows: config.max_rows,
        };

        if config.seed_demo_data {
            client.seed_demo_data().await?;
        }

        debug!("Opened SQLite database {}", config.display_url());
        Ok(client)
    }

    /// Creates the demo tables and fills them if they are empty.
    async fn seed_demo_data(&self) -> Result<()> {
        for ddl in demo::CREATE_TABLES {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| ServiceError::query(format!("Failed to create demo table: {e}")))?;
        }

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM crop_production")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ServiceError::query(format!("Failed to inspect demo data: {e}")))?;
        if existing > 0 {
            debug!("Demo tables already populated ({existing} crop rows)");
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ServiceError::query(format!("Failed to start seed transaction: {e}")))?;

        let mut inserted = 0usize;
        for row in demo::seed_rows() {
            let statement = match row {
                SeedRow::Crop {
                    state,
                    district,
                    crop,
                    season,
                    year,
                    area_hectares,
                    production_tonnes,
                } => sqlx::query(
                    "INSERT INTO crop_production \
                     (state, district, crop, season, year, area_hectares, production_tonnes, yield_tonnes_per_hectare) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .bind(state)
                .bind(district)
                .bind(crop)
                .bind(season)
                .bind(year)
                .bind(area_hectares)
                .bind(production_tonnes)
                .bind(SeedRow::yield_per_hectare(area_hectares, production_tonnes)),
                SeedRow::Rainfall {
                    state,
                    year,
                    annual_mm,
                    monsoon_mm,
                } => sqlx::query(
                    "INSERT INTO rainfall (state, year, annual_rainfall_mm, monsoon_rainfall_mm) \
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .bind(state)
                .bind(year)
                .bind(annual_mm)
                .bind(monsoon_mm),
            };

            statement
                .execute(&mut *tx)
                .await
                .map_err(|e| ServiceError::query(format!("Failed to insert demo row: {e}")))?;
            inserted += 1;
        }

        tx.commit()
            .await
            .map_err(|e| ServiceError::query(format!("Failed to commit demo data: {e}")))?;

        info!("Seeded {inserted} demo rows");
        Ok(())
    }

    async fn fetch_tables(&self) -> Result<Vec<Table>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ServiceError::query(format!("Failed to fetch tables: {e}")))?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            tables.push(self.fetch_table(name).await?);
        }
        Ok(tables)
    }

    async fn fetch_table(&self, name: String) -> Result<Table> {
        let rows: Vec<(String, String, i64, Option<String>, i64)> = sqlx::query_as(
            r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid"#,
        )
        .bind(&name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ServiceError::query(format!("Failed to fetch columns for {name}: {e}")))?;

        let mut pk: Vec<(i64, String)> = Vec::new();
        let columns = rows
            .into_iter()
            .map(|(column, data_type, not_null, default, pk_position)| {
                if pk_position > 0 {
                    pk.push((pk_position, column.clone()));
                }
                Column {
                    name: column,
                    data_type,
                    is_nullable: not_null == 0 && pk_position == 0,
                    default,
                }
            })
            .collect();
        pk.sort();

        Ok(Table {
            name,
            columns,
            primary_key: pk.into_iter().map(|(_, column)| column).collect(),
        })
    }

    async fn fetch_foreign_keys(&self, tables: &[Table]) -> Result<Vec<ForeignKey>> {
        let mut foreign_keys = Vec::new();

        for table in tables {
            let rows: Vec<(i64, String, String, Option<String>)> = sqlx::query_as(
                r#"SELECT id, "from", "table", "to" FROM pragma_foreign_key_list(?1) ORDER BY id, seq"#,
            )
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                ServiceError::query(format!(
                    "Failed to fetch foreign keys for {}: {e}",
                    table.name
                ))
            })?;

            let mut grouped: BTreeMap<i64, ForeignKey> = BTreeMap::new();
            for (id, from, to_table, to) in rows {
                let fk = grouped.entry(id).or_insert_with(|| {
                    ForeignKey::new(table.name.clone(), Vec::new(), to_table, Vec::new())
                });
                fk.from_columns.push(from);
                // A missing target column refers to the parent's primary key.
                fk.to_columns.push(to.unwrap_or_else(|| "id".to_string()));
            }
            foreign_keys.extend(grouped.into_values());
        }

        Ok(foreign_keys)
    }

    /// Describes the columns of a statement that produced no rows.
    async fn fetch_column_metadata(&self, sql: &str) -> Vec<ColumnInfo> {
        match (&self.pool).prepare(sql).await {
            Ok(statement) => statement
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        let tables = self.fetch_tables().await?;
        let foreign_keys = self.fetch_foreign_keys(&tables).await?;

        Ok(Schema {
            tables,
            foreign_keys,
        })
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(self.query_timeout, sqlx::query(sql).fetch_all(&self.pool))
            .await
            .map_err(|_| {
                ServiceError::query(format!(
                    "Query timed out after {} seconds",
                    self.query_timeout.as_secs()
                ))
            })?
            .map_err(|e| ServiceError::query(format_query_error(e)))?;

        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = match result.first() {
            Some(first_row) => first_row
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect(),
            None => self.fetch_column_metadata(sql).await,
        };

        let total_rows = result.len();
        let was_truncated = total_rows > self.max_rows;
        if was_truncated {
            warn!(
                "Query returned {} rows, truncating to {} rows",
                total_rows, self.max_rows
            );
        }

        let rows: Vec<Row> = result.iter().take(self.max_rows).map(convert_row).collect();
        let row_count = rows.len();

        Ok(QueryResult {
            columns,
            rows,
            execution_time,
            row_count,
            total_rows: Some(total_rows),
            was_truncated,
        })
    }

    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

/// Converts a single column using the storage class of the stored value.
///
/// SQLite typing is per value, so computed columns (aggregates, expressions)
/// carry no declared type and are decoded from whatever was actually stored.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let storage = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return Value::Null,
    };

    let decoded = match storage.as_str() {
        "INTEGER" | "INT" | "BIGINT" => row.try_get::<i64, _>(index).ok().map(Value::Int),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => {
            row.try_get::<f64, _>(index).ok().map(Value::Float)
        }
        "BOOLEAN" => row.try_get::<bool, _>(index).ok().map(Value::Bool),
        "BLOB" => row.try_get::<Vec<u8>, _>(index).ok().map(Value::Bytes),
        _ => row.try_get::<String, _>(index).ok().map(Value::String),
    };

    decoded.unwrap_or_else(|| decode_any(row, index))
}

fn decode_any(row: &SqliteRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<i64, _>(index) {
        Value::Int(v)
    } else if let Ok(v) = row.try_get::<f64, _>(index) {
        Value::Float(v)
    } else if let Ok(v) = row.try_get::<String, _>(index) {
        Value::String(v)
    } else if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        Value::Bytes(v)
    } else {
        Value::Null
    }
}

fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => format!("ERROR: {}", db_error.message()),
        None => error.to_string(),
    }
}
