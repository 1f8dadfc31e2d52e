//! Bounded-concurrency dispatcher over a single inner engine.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument};

use crate::engine::ProfileEngine;
use crate::error::{ProfileError, Result};
use crate::model::{
    DataSource, ProfileNonFunctionalRequirements, ProfileRequest, ProfileResponse,
};

/// Splits a request list into the units of work dispatched concurrently.
pub type RequestPartitioner =
    dyn Fn(&[ProfileRequest]) -> Vec<Vec<ProfileRequest>> + Send + Sync;

/// Composite engine that fans requests out to concurrent copies of one
/// inner engine.
///
/// The partitioner decides the units of work. The default keeps the whole
/// request list as one unit (no parallelism until a partitioner is chosen);
/// [`ParallelProfileEngine::per_request`] dispatches each request on its
/// own, and warehouse composites plug in their own grouping (e.g. one unit
/// per dataset). At most `max_workers` units run at a time. Responses merge
/// in completion order, which is safe because the uniqueness gate
/// guarantees units never share a statistic name.
///
/// Unlike the leaf engines, an inner error here aborts the whole call: the
/// inner engine already converts per-batch failures into data, so anything
/// that still comes back through the `Result` channel is a configuration
/// error and repeating it per unit would only hide it.
pub struct ParallelProfileEngine {
    inner: Arc<dyn ProfileEngine>,
    max_workers: usize,
    partitioner: Option<Arc<RequestPartitioner>>,
}

impl ParallelProfileEngine {
    /// Creates a dispatcher with one worker per available CPU.
    pub fn new(inner: Arc<dyn ProfileEngine>) -> Self {
        Self {
            inner,
            max_workers: num_cpus::get().max(1),
            partitioner: None,
        }
    }

    /// Caps the number of concurrently running units.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Replaces the default single-unit split.
    pub fn with_partitioner(mut self, partitioner: Arc<RequestPartitioner>) -> Self {
        self.partitioner = Some(partitioner);
        self
    }

    /// Partitioner that dispatches every request as its own unit.
    pub fn per_request() -> Arc<RequestPartitioner> {
        Arc::new(|requests: &[ProfileRequest]| {
            requests.iter().map(|r| vec![r.clone()]).collect()
        })
    }

    fn partition(&self, requests: &[ProfileRequest]) -> Vec<Vec<ProfileRequest>> {
        match &self.partitioner {
            Some(partitioner) => partitioner(requests),
            None => vec![requests.to_vec()],
        }
    }
}

#[async_trait]
impl ProfileEngine for ParallelProfileEngine {
    fn name(&self) -> &str {
        "parallel"
    }

    #[instrument(skip_all, fields(engine = self.name(), requests = requests.len(), max_workers = self.max_workers))]
    async fn do_profile(
        &self,
        datasource: &DataSource,
        requests: &[ProfileRequest],
        requirements: &ProfileNonFunctionalRequirements,
    ) -> Result<ProfileResponse> {
        let units = self.partition(requests);
        debug!(units = units.len(), "dispatching work units");

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks: JoinSet<Result<ProfileResponse>> = JoinSet::new();

        for unit in units {
            if unit.is_empty() {
                continue;
            }
            let inner = Arc::clone(&self.inner);
            let semaphore = Arc::clone(&semaphore);
            let datasource = datasource.clone();
            let requirements = *requirements;
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| ProfileError::Worker(e.to_string()))?;
                inner.do_profile(&datasource, &unit, &requirements).await
            });
        }

        let mut response = ProfileResponse::new();
        while let Some(joined) = tasks.join_next().await {
            let unit_response = joined.map_err(|e| ProfileError::Worker(e.to_string()))??;
            response.merge(unit_response);
        }
        Ok(response)
    }
}
