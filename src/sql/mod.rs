//! Generic SELECT statement model and dialect rendering.
//!
//! The SQL-generating engine builds one [`SelectStatement`] per batch and
//! hands it to a [`DialectTranspiler`] to produce warehouse-correct SQL
//! text. Transpilation is a consumed capability with no side effects;
//! [`GenericTranspiler`] is the default implementation and callers can swap
//! in their own (e.g. one backed by a full transpilation library).

use crate::error::{ProfileError, Result};
use crate::model::{DataSourceKind, SampleSpec};

/// Target SQL dialect for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Snowflake,
    BigQuery,
}

impl From<DataSourceKind> for Dialect {
    fn from(kind: DataSourceKind) -> Self {
        match kind {
            DataSourceKind::Snowflake => Dialect::Snowflake,
            DataSourceKind::BigQuery => Dialect::BigQuery,
        }
    }
}

/// One projected column: an aggregate expression and its output alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectColumn {
    /// Aggregate expression, e.g. `COUNT(DISTINCT id)`.
    pub expr: String,
    /// Backend-safe output alias.
    pub alias: String,
}

/// A generic single-table SELECT of aggregate expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectStatement {
    /// Projected aggregate columns.
    pub columns: Vec<SelectColumn>,
    /// Table reference to select from.
    pub table: String,
    /// Optional row sampling.
    pub sample: Option<SampleSpec>,
}

/// Renders a generic statement into dialect-correct SQL text.
pub trait DialectTranspiler: Send + Sync {
    /// Renders the statement for the target dialect.
    fn transpile(&self, statement: &SelectStatement, dialect: Dialect) -> Result<String>;
}

/// Default transpiler covering the dialect differences the engines need:
/// the sampling clause syntax.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericTranspiler;

impl DialectTranspiler for GenericTranspiler {
    fn transpile(&self, statement: &SelectStatement, dialect: Dialect) -> Result<String> {
        if statement.columns.is_empty() {
            return Err(ProfileError::Transpile(
                "statement has no projected columns".to_string(),
            ));
        }

        let projections = statement
            .columns
            .iter()
            .map(|c| format!("{} AS {}", c.expr, c.alias))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!("SELECT {projections} FROM {}", statement.table);
        if let Some(sample) = &statement.sample {
            match dialect {
                Dialect::Snowflake => sql.push_str(&format!(" TABLESAMPLE ({} ROWS)", sample.size)),
                Dialect::BigQuery => {
                    sql.push_str(&format!(" TABLESAMPLE SYSTEM ({} ROWS)", sample.size))
                }
            }
        }
        Ok(sql)
    }
}

/// Maps a fully-qualified statistic name to a backend-safe alias.
///
/// Fq-names may contain characters illegal in identifiers (dots, spaces,
/// dashes) and casing that backends normalize; the mapping is deterministic
/// so the engine can keep a reverse alias table for result decoding.
pub fn sql_safe_alias(fq_name: &str) -> String {
    fq_name
        .replace(['.', ' ', '-'], "_")
        .to_lowercase()
}

/// Trims a fully-qualified dataset name to the trailing `schema.table`
/// segments for use in a FROM clause; the database segment comes from the
/// connection itself.
pub fn dialect_table_name(fq_dataset_name: &str) -> String {
    let segments: Vec<&str> = fq_dataset_name.split('.').collect();
    if segments.len() <= 2 {
        fq_dataset_name.to_string()
    } else {
        segments[segments.len() - 2..].join(".")
    }
}
