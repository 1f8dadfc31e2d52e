//! External collaborator contracts consumed by the leaf engines.
//!
//! The core does not own any warehouse client library. Leaf engines talk to
//! the backends through these narrow seams: a [`ConnectionProvider`] turns a
//! [`DataSource`] into something that can execute dialect-specific SQL and
//! yield rows with named columns, and a [`StatisticObserver`] wraps the
//! external validation/assertion library that can compute observed values
//! for a subset of statistic types on its own.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::model::{BatchSpec, DataSource, StatValue};

/// A single result row: column name to value.
///
/// Column-name casing is backend-specific; consumers normalize to lowercase
/// before lookup.
pub type Row = HashMap<String, StatValue>;

/// Executes dialect-specific SQL text against an open warehouse session.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Executes the query and returns all result rows.
    async fn execute(&self, sql: &str) -> Result<Vec<Row>>;
}

/// Opens warehouse sessions for a [`DataSource`].
///
/// Implementations own per-backend construction options taken from
/// [`DataSource::extra_config`], e.g. a `credentials_path` for BigQuery.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Returns an executor bound to the given datasource.
    async fn connect(&self, datasource: &DataSource) -> Result<Arc<dyn QueryExecutor>>;
}

/// The external validation/assertion library seam.
///
/// The core's only contract with it: it supports exact column distinct
/// counts on whole, unsampled tables. Everything else is reported
/// unsupported by the engine wrapping this trait.
#[async_trait]
pub trait StatisticObserver: Send + Sync {
    /// Observes the distinct count over the given columns of a whole table.
    async fn observe_distinct_count(
        &self,
        datasource: &DataSource,
        batch: &BatchSpec,
        columns: &[String],
    ) -> Result<StatValue>;
}
