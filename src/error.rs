//! Error types for the tablestat profiling library.
//!
//! This module provides the error handling strategy for the crate using
//! `thiserror`. Configuration errors (duplicate statistic names, invalid
//! statistic construction, rejected SQL input) are raised synchronously
//! through this type; execution failures against a warehouse backend are
//! instead captured as [`crate::model::StatisticResult::Unsuccessful`]
//! entries inside the response so composite engines can inspect and react.

use thiserror::Error;

/// The main error type for the tablestat library.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// A fully-qualified statistic name appears more than once across the
    /// input request list. Raised before any backend work starts.
    #[error("Duplicate fully-qualified statistic name: '{0}'")]
    DuplicateStatisticName(String),

    /// A statistic spec is structurally invalid, e.g. a column-level
    /// statistic without target columns.
    #[error("Invalid statistic: {0}")]
    InvalidStatistic(String),

    /// User-provided SQL input (identifier or custom expression) was
    /// rejected by the security screening.
    #[error("Security error: {0}")]
    Security(String),

    /// Failed to open a connection or session against a datasource.
    #[error("Connection error: {message}")]
    Connection {
        /// Detailed error message.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A query failed while executing against the backend.
    #[error("Query execution failed: {message}")]
    QueryExecution {
        /// Detailed error message.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The generic statement could not be rendered for the target dialect.
    #[error("Transpilation failed: {0}")]
    Transpile(String),

    /// A parallel worker group failed in an unexpected way (e.g. panicked).
    #[error("Worker task failed: {0}")]
    Worker(String),

    /// The queue-fronted engine was shut down before the submitted request
    /// completed.
    #[error("Profile engine shut down before the request completed")]
    EngineShutDown,

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProfileError {
    /// Creates an invalid-statistic error with the given message.
    pub fn invalid_statistic(msg: impl Into<String>) -> Self {
        Self::InvalidStatistic(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            message: msg.into(),
            source: None,
        }
    }

    /// Creates a query execution error with the given message.
    pub fn query_execution(msg: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: msg.into(),
            source: None,
        }
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error is a configuration error that should abort the
    /// whole call rather than be downgraded to a per-statistic result.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateStatisticName(_) | Self::InvalidStatistic(_) | Self::Security(_)
        )
    }
}

/// A type alias for `Result<T, ProfileError>`.
///
/// This is the standard `Result` type used throughout the tablestat library.
pub type Result<T> = std::result::Result<T, ProfileError>;
