//! Logging configuration for tablestat.
//!
//! The library emits structured events through the `tracing` crate and never
//! installs a subscriber itself; binaries choose their own. This module
//! carries the knobs that keep warehouse-facing logs cheap and bounded.

use tracing::Level;

/// Logging configuration for the profiling engines.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for tablestat components.
    pub base_level: Level,
    /// Whether to log generated SQL statements.
    pub log_statements: bool,
    /// Maximum length for logged field values such as SQL text.
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_statements: true,
            max_field_length: 512,
        }
    }
}

impl LogConfig {
    /// Verbose configuration suitable for debugging generated SQL.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_statements: true,
            max_field_length: 2048,
        }
    }

    /// Minimal configuration for production with lowest overhead.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_statements: false,
            max_field_length: 128,
        }
    }
}

/// Truncates a field value to the maximum logged length.
///
/// Generated statements grow with the number of projected statistics, so
/// log lines cap them rather than echo whole batches.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    // The cut must land on a char boundary or the slice panics.
    let cut = (0..=max_length)
        .rev()
        .find(|i| value.is_char_boundary(*i))
        .unwrap_or(0);
    let truncated = &value[..cut];
    format!("{truncated}...(truncated)")
}
