//! LLM tool definitions for function calling.
//!
//! The model has one tool: `execute_sql_query`, which runs a single
//! statement against the analytics store and returns the rows as JSON.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use crate::db::DatabaseClient;
use crate::safety::SqlClassifier;

use super::types::{ToolCall, ToolResult};

/// Name the model uses to call the SQL tool.
pub const SQL_TOOL_NAME: &str = "execute_sql_query";

/// Tool definition for LLM function calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: JsonValue,
}

/// Executes model-issued SQL against the store.
///
/// Never fails: every problem is reported back to the model as
/// `{"error": "..."}` so it can correct itself.
pub struct SqlTool {
    db: Arc<dyn DatabaseClient>,
    classifier: SqlClassifier,
    allow_writes: bool,
    max_rows: usize,
}

impl SqlTool {
    /// Creates a read-only tool over `db`.
    pub fn new(db: Arc<dyn DatabaseClient>, max_rows: usize) -> Self {
        Self {
            db,
            classifier: SqlClassifier::new(),
            allow_writes: false,
            max_rows,
        }
    }

    /// Permits statements that modify data.
    pub fn allow_writes(mut self, allow: bool) -> Self {
        self.allow_writes = allow;
        self
    }

    /// Returns the declaration sent to the model.
    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: SQL_TOOL_NAME.to_string(),
            description: "Execute a single SQL query against the agricultural and climate \
                          database and return the resulting rows. Use the table and column \
                          names from the schema exactly as given."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "One SQL SELECT statement to execute"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    /// Answers one tool call, including calls to tools that do not exist.
    pub async fn handle(&self, call: &ToolCall) -> ToolResult {
        let content = if call.name != SQL_TOOL_NAME {
            warn!(tool = %call.name, "Model called an unknown tool");
            json!({ "error": format!("Unknown tool: {}", call.name) })
        } else {
            match call.str_argument("query") {
                Some(sql) => self.execute(sql).await,
                None => json!({ "error": "Missing required argument 'query'" }),
            }
        };
        ToolResult::for_call(call, content)
    }

    /// Executes `sql` and renders the outcome as JSON.
    pub async fn execute(&self, sql: &str) -> JsonValue {
        let sql = sql.trim();
        if sql.is_empty() {
            return json!({ "error": "Empty SQL query" });
        }

        if let Some(rejection) = self.check(sql) {
            debug!(reason = %rejection, "Rejected SQL from model");
            return json!({ "error": rejection });
        }

        let start = Instant::now();
        match self.db.execute_query(sql).await {
            Ok(result) => {
                let result = result.truncate(self.max_rows);
                debug!(
                    duration_ms = start.elapsed().as_millis() as u64,
                    row_count = result.row_count,
                    truncated = result.was_truncated,
                    "Executed SQL tool call"
                );
                json!({
                    "columns": result.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                    "rows": result.rows_as_maps(),
                    "row_count": result.row_count,
                    "truncated": result.was_truncated,
                })
            }
            Err(e) => {
                warn!(
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "SQL tool call failed"
                );
                json!({ "error": e.to_string() })
            }
        }
    }

    /// Returns a rejection message, or `None` if `sql` may run.
    fn check(&self, sql: &str) -> Option<String> {
        match self.classifier.classify(sql) {
            Ok(classification) if classification.is_multi_statement() => Some(format!(
                "Only one SQL statement may be executed per call (got {})",
                classification.statement_count
            )),
            Ok(classification) if !classification.level.is_read_only() && !self.allow_writes => {
                Some(format!(
                    "{} statements are not allowed: the database is read-only",
                    classification.statement_type
                ))
            }
            Ok(_) => None,
            // The store has the final say on syntax the parser does not know.
            Err(_) if self.allow_writes || !self.classifier.looks_like_write(sql) => None,
            Err(_) => Some(
                "Statement could not be verified as read-only; the database is read-only"
                    .to_string(),
            ),
        }
    }
}
