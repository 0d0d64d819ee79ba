//! Prompt construction for model requests.
//!
//! Builds the system instruction with the analyst persona, the required
//! working process and the current database schema.

use crate::db::Schema;
use std::sync::Arc;

/// System instruction template for the analytics assistant.
const SYSTEM_INSTRUCTION_TEMPLATE: &str = r#"You are an expert data analyst for agricultural and environmental data in India.
You answer questions about crop production, yields and rainfall using the database described below.

PROCESS:
1. Plan which tables and columns answer the question.
2. Generate ONE optimized SQL query that retrieves exactly the data you need.
3. Execute it with the execute_sql_query tool.
4. Synthesize the returned rows into insights.
5. Answer the question, citing the specific figures, tables and years you used.

RULES:
- Use only the tables and columns listed in the schema.
- Only read data. Never modify the database.
- If a query fails, read the error, fix the SQL and try again.
- If the data cannot answer the question, say so plainly.
- Structure the answer with headers and bullet points, and give specific numbers.

{schema}"#;

/// Builds the system instruction with the schema description injected.
pub fn build_system_instruction(schema: &Schema) -> String {
    SYSTEM_INSTRUCTION_TEMPLATE.replace("{schema}", &schema.format_for_llm())
}

/// Cache for the formatted system instruction.
///
/// Rebuilt only when the schema's content hash changes.
#[derive(Debug, Default)]
pub struct PromptCache {
    schema_hash: u64,
    instruction: Option<Arc<str>>,
}

impl PromptCache {
    /// Creates a new empty prompt cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the cached instruction, rebuilding if the schema has changed.
    pub fn get_or_build(&mut self, schema: &Schema) -> Arc<str> {
        let hash = schema.content_hash();
        match &self.instruction {
            Some(instruction) if self.schema_hash == hash => Arc::clone(instruction),
            _ => {
                let instruction: Arc<str> = Arc::from(build_system_instruction(schema));
                self.schema_hash = hash;
                self.instruction = Some(Arc::clone(&instruction));
                instruction
            }
        }
    }

    /// Invalidates the cache, forcing a rebuild on next access.
    pub fn invalidate(&mut self) {
        self.schema_hash = 0;
        self.instruction = None;
    }
}
