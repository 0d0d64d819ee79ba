//! SQL parsing and classification logic.
//!
//! Uses sqlparser-rs with the generic dialect, which accepts both the SQLite
//! and PostgreSQL syntax the model tends to produce.

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};

use crate::error::{Result, ServiceError};

use super::{ClassificationResult, SafetyLevel, StatementType};

/// Keywords that start a write when they appear unquoted anywhere in a statement.
const WRITE_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "MERGE", "REPLACE", "UPSERT", "DROP", "TRUNCATE", "ALTER",
    "CREATE", "GRANT", "REVOKE", "ATTACH", "DETACH", "VACUUM", "REINDEX", "PRAGMA",
];

/// SQL classifier that parses and classifies SQL statements.
#[derive(Debug, Default)]
pub struct SqlClassifier {
    dialect: GenericDialect,
}

impl SqlClassifier {
    /// Creates a new SQL classifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and classifies `sql`.
    ///
    /// Returns an error when the input cannot be parsed; callers decide
    /// whether to trust such input.
    pub fn classify(&self, sql: &str) -> Result<ClassificationResult> {
        let statements = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| ServiceError::query(format!("SQL parse error: {e}")))?;

        let mut classified = statements.iter().map(classify_statement);
        let Some(first) = classified.next() else {
            return Err(ServiceError::query("Empty SQL statement"));
        };
        let (level, statement_type) =
            classified.fold(first, |max, next| if next.0 > max.0 { next } else { max });

        let statement_type = if statements.len() > 1 {
            StatementType::Multiple(Box::new(statement_type))
        } else {
            statement_type
        };

        Ok(ClassificationResult {
            level,
            statement_type,
            statement_count: statements.len(),
        })
    }

    /// Lexical fallback for input the parser rejects: true if any unquoted
    /// word is a write keyword. Untokenizable input counts as a write.
    pub fn looks_like_write(&self, sql: &str) -> bool {
        match Tokenizer::new(&self.dialect, sql).tokenize() {
            Ok(tokens) => tokens.iter().any(|token| match token {
                Token::Word(word) if word.quote_style.is_none() => WRITE_KEYWORDS
                    .iter()
                    .any(|kw| word.value.eq_ignore_ascii_case(kw)),
                _ => false,
            }),
            Err(_) => true,
        }
    }
}

/// Convenience function to classify SQL without creating a classifier instance.
pub fn classify_sql(sql: &str) -> Result<ClassificationResult> {
    SqlClassifier::new().classify(sql)
}

fn classify_statement(statement: &Statement) -> (SafetyLevel, StatementType) {
    match statement {
        // May contain data-modifying CTEs, so recurse.
        Statement::Query(query) => classify_query(query),
        Statement::Explain {
            analyze, statement, ..
        } => {
            if *analyze {
                // EXPLAIN ANALYZE executes the statement.
                let (inner_level, _) = classify_statement(statement);
                (inner_level, StatementType::Explain)
            } else {
                (SafetyLevel::Safe, StatementType::Explain)
            }
        }
        Statement::ShowVariable { .. } | Statement::ShowTables { .. } => {
            (SafetyLevel::Safe, StatementType::Show)
        }

        Statement::Insert { .. } => (SafetyLevel::Mutating, StatementType::Insert),
        Statement::Update { .. } => (SafetyLevel::Mutating, StatementType::Update),
        Statement::Merge { .. } => (SafetyLevel::Mutating, StatementType::Merge),

        Statement::Delete { .. } => (SafetyLevel::Destructive, StatementType::Delete),
        Statement::Drop { .. } => (SafetyLevel::Destructive, StatementType::Drop),
        Statement::Truncate { .. } => (SafetyLevel::Destructive, StatementType::Truncate),
        Statement::AlterTable { .. } => (SafetyLevel::Destructive, StatementType::Alter),
        Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. } => (SafetyLevel::Destructive, StatementType::Create),
        Statement::Grant { .. } => (SafetyLevel::Destructive, StatementType::Grant),
        Statement::Revoke { .. } => (SafetyLevel::Destructive, StatementType::Revoke),

        _ => (SafetyLevel::Destructive, StatementType::Unknown),
    }
}

fn classify_query(query: &Query) -> (SafetyLevel, StatementType) {
    let mut max = (SafetyLevel::Safe, StatementType::Select);

    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            max = most_dangerous(max, classify_query(&cte.query));
        }
    }

    most_dangerous(max, classify_set_expr(&query.body))
}

fn classify_set_expr(set_expr: &SetExpr) -> (SafetyLevel, StatementType) {
    match set_expr {
        SetExpr::Insert(stmt) | SetExpr::Update(stmt) => classify_statement(stmt),
        SetExpr::Query(query) => classify_query(query),
        SetExpr::Select(select) => classify_select(select),
        SetExpr::SetOperation { left, right, .. } => {
            most_dangerous(classify_set_expr(left), classify_set_expr(right))
        }
        _ => (SafetyLevel::Safe, StatementType::Select),
    }
}

fn classify_select(select: &Select) -> (SafetyLevel, StatementType) {
    // SELECT ... INTO creates and fills a new table.
    if select.into.is_some() {
        return (SafetyLevel::Destructive, StatementType::Create);
    }

    select.from.iter().map(classify_table_with_joins).fold(
        (SafetyLevel::Safe, StatementType::Select),
        most_dangerous,
    )
}

fn classify_table_with_joins(twj: &TableWithJoins) -> (SafetyLevel, StatementType) {
    twj.joins
        .iter()
        .map(|join| classify_table_factor(&join.relation))
        .fold(classify_table_factor(&twj.relation), most_dangerous)
}

fn classify_table_factor(factor: &TableFactor) -> (SafetyLevel, StatementType) {
    match factor {
        TableFactor::Derived { subquery, .. } => classify_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => classify_table_with_joins(table_with_joins),
        _ => (SafetyLevel::Safe, StatementType::Select),
    }
}

fn most_dangerous(
    current: (SafetyLevel, StatementType),
    candidate: (SafetyLevel, StatementType),
) -> (SafetyLevel, StatementType) {
    if candidate.0 > current.0 {
        candidate
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_classification(sql: &str, expected_level: SafetyLevel, expected_type: StatementType) {
        let result = classify_sql(sql).unwrap();
        assert_eq!(
            result.level, expected_level,
            "SQL: '{}' - expected level {:?}, got {:?}",
            sql, expected_level, result.level
        );
        assert_eq!(
            result.statement_type, expected_type,
            "SQL: '{}' - expected type {:?}, got {:?}",
            sql, expected_type, result.statement_type
        );
    }

    #[test]
    fn test_select_is_safe() {
        assert_classification(
            "SELECT state, SUM(production_tonnes) FROM crop_production GROUP BY state",
            SafetyLevel::Safe,
            StatementType::Select,
        );
    }

    #[test]
    fn test_join_with_subquery_is_safe() {
        assert_classification(
            "SELECT c.year, c.yield_tonnes_per_hectare, r.annual_rainfall_mm \
             FROM crop_production c \
             JOIN (SELECT * FROM rainfall WHERE state = 'Punjab') r \
               ON c.state = r.state AND c.year = r.year",
            SafetyLevel::Safe,
            StatementType::Select,
        );
    }

    #[test]
    fn test_cte_select_is_safe() {
        assert_classification(
            "WITH yearly AS (SELECT year, AVG(annual_rainfall_mm) AS mm FROM rainfall GROUP BY year) \
             SELECT * FROM yearly ORDER BY year",
            SafetyLevel::Safe,
            StatementType::Select,
        );
    }

    #[test]
    fn test_explain_is_safe() {
        assert_classification(
            "EXPLAIN SELECT * FROM rainfall",
            SafetyLevel::Safe,
            StatementType::Explain,
        );
    }

    #[test]
    fn test_explain_analyze_delete_is_destructive() {
        assert_classification(
            "EXPLAIN ANALYZE DELETE FROM rainfall",
            SafetyLevel::Destructive,
            StatementType::Explain,
        );
    }

    #[test]
    fn test_insert_is_mutating() {
        assert_classification(
            "INSERT INTO rainfall (state, year, annual_rainfall_mm) VALUES ('Goa', 2022, 3000)",
            SafetyLevel::Mutating,
            StatementType::Insert,
        );
    }

    #[test]
    fn test_update_is_mutating() {
        assert_classification(
            "UPDATE crop_production SET area_hectares = 0 WHERE id = 1",
            SafetyLevel::Mutating,
            StatementType::Update,
        );
    }

    #[test]
    fn test_delete_is_destructive() {
        assert_classification(
            "DELETE FROM crop_production WHERE year < 2019",
            SafetyLevel::Destructive,
            StatementType::Delete,
        );
    }

    #[test]
    fn test_schema_changes_are_destructive() {
        assert_classification("DROP TABLE rainfall", SafetyLevel::Destructive, StatementType::Drop);
        assert_classification(
            "ALTER TABLE rainfall ADD COLUMN source TEXT",
            SafetyLevel::Destructive,
            StatementType::Alter,
        );
        assert_classification(
            "CREATE TABLE scratch (id INTEGER)",
            SafetyLevel::Destructive,
            StatementType::Create,
        );
    }

    #[test]
    fn test_select_into_is_destructive() {
        assert_classification(
            "SELECT * INTO rainfall_copy FROM rainfall",
            SafetyLevel::Destructive,
            StatementType::Create,
        );
        assert_classification(
            "SELECT state FROM rainfall UNION SELECT state INTO states_copy FROM crop_production",
            SafetyLevel::Destructive,
            StatementType::Create,
        );
    }

    #[test]
    fn test_multi_statement_uses_most_dangerous() {
        let result = classify_sql("SELECT 1; DROP TABLE rainfall; SELECT 2").unwrap();

        assert_eq!(result.level, SafetyLevel::Destructive);
        assert_eq!(
            result.statement_type,
            StatementType::Multiple(Box::new(StatementType::Drop))
        );
        assert_eq!(result.statement_count, 3);
        assert!(result.is_multi_statement());
    }

    #[test]
    fn test_multi_statement_all_safe() {
        let result = classify_sql("SELECT 1; SELECT 2").unwrap();

        assert_eq!(result.level, SafetyLevel::Safe);
        assert!(result.is_multi_statement());
    }

    #[test]
    fn test_parse_failure_is_error() {
        assert!(classify_sql("SELEC * FORM rainfall").is_err());
    }

    #[test]
    fn test_empty_sql_is_error() {
        assert!(classify_sql("").is_err());
        assert!(classify_sql("   ").is_err());
    }

    #[test]
    fn test_case_insensitive() {
        assert_classification(
            "select * from rainfall",
            SafetyLevel::Safe,
            StatementType::Select,
        );
        assert_classification(
            "delete from rainfall",
            SafetyLevel::Destructive,
            StatementType::Delete,
        );
    }

    #[test]
    fn test_looks_like_write() {
        let classifier = SqlClassifier::new();

        assert!(classifier.looks_like_write("WITH gone AS (DELETE FROM rainfall RETURNING *) SELECT 1"));
        assert!(classifier.looks_like_write("pragma writable_schema = 1"));
        assert!(!classifier.looks_like_write("SELECT \"update\" FROM audit_log"));
        assert!(!classifier.looks_like_write("SELECT 'DELETE' AS label"));
    }
}
