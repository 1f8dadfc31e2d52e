//! Security utilities for the tablestat profiling library.
//!
//! Statistic specs carry user-provided column names and raw SQL expressions
//! that end up inside generated SELECT statements. This module screens that
//! input at construction time so a malformed spec is rejected as a
//! configuration error before any query is built.

use crate::error::{ProfileError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// SQL identifier validation and screening utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates a SQL identifier (column name, table segment).
    ///
    /// Identifiers must start with a letter or underscore and contain only
    /// letters, numbers, underscores, and dots (for qualified names).
    ///
    /// # Examples
    /// ```rust
    /// use tablestat::security::SqlSecurity;
    ///
    /// assert!(SqlSecurity::validate_identifier("customer_id").is_ok());
    /// assert!(SqlSecurity::validate_identifier("id; DROP TABLE users--").is_err());
    /// ```
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.is_empty() || identifier.trim().is_empty() {
            return Err(ProfileError::Security(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier.len() > 128 {
            return Err(ProfileError::Security(
                "SQL identifier too long (max 128 characters)".to_string(),
            ));
        }

        if identifier.contains('\0') {
            return Err(ProfileError::Security(
                "SQL identifier cannot contain null bytes".to_string(),
            ));
        }

        static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
            // This regex is compile-time constant and known to be valid
            #[allow(clippy::expect_used)]
            Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)*$")
                .expect("Hard-coded regex pattern should be valid")
        });

        if !IDENTIFIER_REGEX.is_match(identifier) {
            return Err(ProfileError::Security(format!(
                "Invalid SQL identifier format: '{identifier}'. Identifiers must start with a \
                 letter or underscore and contain only letters, numbers, underscores, and dots"
            )));
        }

        Ok(())
    }

    /// Validates a custom SQL aggregate expression.
    ///
    /// Custom statistics are an escape hatch for arbitrary aggregates, so
    /// this only rejects input that could break out of the generated SELECT
    /// list or mutate state, not legitimate expressions.
    pub fn validate_sql_expression(expression: &str) -> Result<()> {
        if expression.trim().is_empty() {
            return Err(ProfileError::Security(
                "SQL expression cannot be empty".to_string(),
            ));
        }

        if expression.len() > 5000 {
            return Err(ProfileError::Security(
                "SQL expression too long (max 5000 characters)".to_string(),
            ));
        }

        if expression.contains('\0') {
            return Err(ProfileError::Security(
                "SQL expression cannot contain null bytes".to_string(),
            ));
        }

        let lowered = expression.to_lowercase();

        let dangerous_keywords = &[
            "drop ", "create ", "alter ", "truncate ", "insert ", "update ", "delete ", "exec ",
            "execute ", "grant ", "revoke ", "--", "/*", "*/", ";",
        ];
        for keyword in dangerous_keywords {
            if lowered.contains(keyword) {
                return Err(ProfileError::Security(format!(
                    "SQL expression contains dangerous pattern: '{}'",
                    keyword.trim()
                )));
            }
        }

        Ok(())
    }
}
