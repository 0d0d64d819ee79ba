//! Database schema types for Samarth.
//!
//! Represents the structure of the relational store (tables, columns and
//! foreign keys) and renders it as the schema description that grounds the
//! model's SQL generation.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Represents the complete schema of a database.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Schema {
    /// All tables in the schema.
    pub tables: Vec<Table>,

    /// Foreign key relationships between tables.
    pub foreign_keys: Vec<ForeignKey>,
}

impl Schema {
    /// Creates a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the schema contains no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Formats the schema for inclusion in the system instruction.
    ///
    /// One block per table, one line per column with its type and any
    /// PK / NOT NULL / DEFAULT / FK annotations.
    pub fn format_for_llm(&self) -> String {
        if self.tables.is_empty() {
            return "Database Schema:\n\n(no tables available)\n".to_string();
        }

        let mut out = String::from("Database Schema:\n\n");
        for table in &self.tables {
            out.push_str(&format!("Table: {}\n", table.name));
            for column in &table.columns {
                out.push_str(&self.format_column(table, column));
            }
            out.push('\n');
        }

        if !self.foreign_keys.is_empty() {
            out.push_str("Foreign Keys:\n");
            for fk in &self.foreign_keys {
                out.push_str(&format!(
                    "  - {}.{} -> {}.{}\n",
                    fk.from_table,
                    fk.from_columns.join(", "),
                    fk.to_table,
                    fk.to_columns.join(", ")
                ));
            }
        }

        out
    }

    fn format_column(&self, table: &Table, column: &Column) -> String {
        let mut annotations = Vec::new();
        if table.primary_key.contains(&column.name) {
            annotations.push("PK".to_string());
        }
        if !column.is_nullable {
            annotations.push("NOT NULL".to_string());
        }
        if let Some(default) = &column.default {
            annotations.push(format!("DEFAULT {default}"));
        }
        annotations.extend(
            self.foreign_keys
                .iter()
                .filter(|fk| fk.from_table == table.name && fk.from_columns.contains(&column.name))
                .map(|fk| {
                    format!(
                        "FK -> {}.{}",
                        fk.to_table,
                        fk.to_columns.first().map(String::as_str).unwrap_or("")
                    )
                }),
        );

        if annotations.is_empty() {
            format!("  - {}: {}\n", column.name, column.data_type)
        } else {
            format!(
                "  - {}: {} ({})\n",
                column.name,
                column.data_type,
                annotations.join(", ")
            )
        }
    }

    /// Computes a hash of the schema content for prompt cache invalidation.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tables.len().hash(&mut hasher);
        for table in &self.tables {
            table.name.hash(&mut hasher);
            for col in &table.columns {
                col.name.hash(&mut hasher);
                col.data_type.hash(&mut hasher);
                col.is_nullable.hash(&mut hasher);
                col.default.hash(&mut hasher);
            }
            table.primary_key.hash(&mut hasher);
        }
        for fk in &self.foreign_keys {
            fk.from_table.hash(&mut hasher);
            fk.from_columns.hash(&mut hasher);
            fk.to_table.hash(&mut hasher);
            fk.to_columns.hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// Represents a database table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Columns in the table.
    pub columns: Vec<Column>,

    /// Column names that form the primary key.
    pub primary_key: Vec<String>,
}

impl Table {
    /// Creates a new table with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Adds a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the primary key columns.
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }
}

/// Represents a column in a table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Data type (e.g., "INTEGER", "varchar(255)").
    pub data_type: String,

    /// Whether the column allows NULL values.
    pub is_nullable: bool,

    /// Default value expression, if any.
    pub default: Option<String>,
}

impl Column {
    /// Creates a new nullable column with the given name and data type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
            default: None,
        }
    }

    /// Sets whether the column is nullable.
    pub fn nullable(self, nullable: bool) -> Self {
        Self {
            is_nullable: nullable,
            ..self
        }
    }

    /// Sets the default value.
    pub fn with_default(self, default: impl Into<String>) -> Self {
        Self {
            default: Some(default.into()),
            ..self
        }
    }
}

/// Represents a foreign key relationship between tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ForeignKey {
    /// Source table name.
    pub from_table: String,

    /// Source column names.
    pub from_columns: Vec<String>,

    /// Target table name.
    pub to_table: String,

    /// Target column names.
    pub to_columns: Vec<String>,
}

impl ForeignKey {
    /// Creates a new foreign key relationship.
    pub fn new(
        from_table: impl Into<String>,
        from_columns: Vec<String>,
        to_table: impl Into<String>,
        to_columns: Vec<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_columns,
            to_table: to_table.into(),
            to_columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        Schema {
            tables: vec![
                Table::new("districts")
                    .column(Column::new("id", "INTEGER").nullable(false))
                    .column(Column::new("state", "TEXT").nullable(false))
                    .primary_key(&["id"]),
                Table::new("harvests")
                    .column(Column::new("id", "INTEGER").nullable(false))
                    .column(Column::new("district_id", "INTEGER").nullable(false))
                    .column(Column::new("season", "TEXT").with_default("'kharif'"))
                    .primary_key(&["id"]),
            ],
            foreign_keys: vec![ForeignKey::new(
                "harvests",
                vec!["district_id".to_string()],
                "districts",
                vec!["id".to_string()],
            )],
        }
    }

    #[test]
    fn test_schema_format_for_llm() {
        let formatted = sample_schema().format_for_llm();

        assert!(formatted.contains("Table: districts"));
        assert!(formatted.contains("Table: harvests"));
        assert!(formatted.contains("id: INTEGER (PK, NOT NULL)"));
        assert!(formatted.contains("season: TEXT (DEFAULT 'kharif')"));
        assert!(formatted.contains("district_id: INTEGER (NOT NULL, FK -> districts.id)"));
        assert!(formatted.contains("Foreign Keys:"));
        assert!(formatted.contains("harvests.district_id -> districts.id"));
    }

    #[test]
    fn test_empty_schema() {
        let formatted = Schema::new().format_for_llm();

        assert!(formatted.contains("Database Schema:"));
        assert!(formatted.contains("no tables available"));
        assert!(!formatted.contains("Foreign Keys:"));
    }

    #[test]
    fn test_content_hash_tracks_changes() {
        let schema = sample_schema();
        let mut changed = schema.clone();
        changed.tables[0].columns.push(Column::new("name", "TEXT"));

        assert_eq!(schema.content_hash(), sample_schema().content_hash());
        assert_ne!(schema.content_hash(), changed.content_hash());
    }

    #[test]
    fn test_column_builder() {
        let col = Column::new("crop", "TEXT")
            .nullable(false)
            .with_default("'rice'");

        assert_eq!(col.name, "crop");
        assert!(!col.is_nullable);
        assert_eq!(col.default, Some("'rice'".to_string()));
    }
}
