//! The engine contract and all computation strategies.
//!
//! [`ProfileEngine`] is the single abstraction every strategy implements:
//! leaf engines issue queries themselves, composite engines coordinate
//! inner engines (fallback chain, parallel dispatcher), and warehouse
//! composites wire leaf engines together for one backend.

pub mod bigquery;
pub mod fallback;
pub mod observer;
pub mod parallel;
pub mod queue;
pub mod row_count;
pub mod snowflake;
pub mod sql;

pub use bigquery::{BigQueryProfileEngine, InformationSchemaProfileEngine};
pub use fallback::FallbackProfileEngine;
pub use observer::ObserverProfileEngine;
pub use parallel::ParallelProfileEngine;
pub use queue::{AsyncProfileEngine, ProfileTicket};
pub use row_count::RowCountProfileEngine;
pub use snowflake::SnowflakeProfileEngine;
pub use sql::SqlProfileEngine;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::collections;
use crate::model::{DataSource, ProfileNonFunctionalRequirements, ProfileRequest, ProfileResponse};

/// A strategy for computing the statistics of a request list.
///
/// `profile` is the public entry point and a template method: it enforces
/// the global invariant that fully-qualified statistic names are unique
/// across the entire input, then delegates to `do_profile`. Implementations
/// override `do_profile` only.
///
/// # Totality
///
/// `do_profile` must be total over its input statistic set: every fq-name
/// appearing in the input must appear in the output response, either as a
/// success or as a typed unsuccessful result. Silent drops are a contract
/// violation.
///
/// # Failure semantics
///
/// Leaf engines catch per-batch execution errors, convert them into
/// unsuccessful results via
/// [`collections::failed_response_for_request`], and never let a failing
/// batch abort its siblings. Errors returned through the `Result` channel
/// are configuration errors (or, for the parallel dispatcher, unexpected
/// worker faults) and abort the whole call.
#[async_trait]
pub trait ProfileEngine: Send + Sync {
    /// Engine identity used for reporting and logging.
    fn name(&self) -> &str;

    /// Public entry point: validates fq-name uniqueness across all input
    /// requests, then delegates to [`ProfileEngine::do_profile`].
    async fn profile(
        &self,
        datasource: &DataSource,
        requests: &[ProfileRequest],
        requirements: &ProfileNonFunctionalRequirements,
    ) -> Result<ProfileResponse> {
        collections::validate_fq_name_uniqueness(requests)?;
        self.do_profile(datasource, requests, requirements).await
    }

    /// Engine-specific computation or delegation step.
    async fn do_profile(
        &self,
        datasource: &DataSource,
        requests: &[ProfileRequest],
        requirements: &ProfileNonFunctionalRequirements,
    ) -> Result<ProfileResponse>;
}
