//! Leaf engine backed by an out-of-band statistic observer.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::engine::ProfileEngine;
use crate::error::Result;
use crate::exec::StatisticObserver;
use crate::model::{
    DataSource, ProfileNonFunctionalRequirements, ProfileRequest, ProfileResponse, StatisticResult,
    StatisticSpec, StatisticType, UnsuccessfulKind,
};
use crate::report::ProfileReport;

/// Leaf engine that answers exact distinct counts through a
/// [`StatisticObserver`] instead of generated SQL.
///
/// Observers typically front a warehouse-side metadata or expectation
/// service whose numbers are only meaningful for the full table, so any
/// sampled or partitioned batch is unsupported here, as is any approximate
/// or non-distinct-count spec.
pub struct ObserverProfileEngine {
    observer: Arc<dyn StatisticObserver>,
    report: Arc<ProfileReport>,
}

impl ObserverProfileEngine {
    pub fn new(observer: Arc<dyn StatisticObserver>) -> Self {
        Self {
            observer,
            report: Arc::new(ProfileReport::new()),
        }
    }

    /// Shares an externally-owned report for cross-engine aggregation.
    pub fn with_report(mut self, report: Arc<ProfileReport>) -> Self {
        self.report = report;
        self
    }

    fn supported_columns<'a>(
        statistic: &'a StatisticSpec,
        request: &ProfileRequest,
    ) -> Option<&'a [String]> {
        match statistic {
            StatisticSpec::Typed(typed)
                if typed.statistic == StatisticType::ColumnDistinctCount
                    && !typed.approximate
                    && request.batch.is_whole_table() =>
            {
                Some(&typed.columns)
            }
            _ => None,
        }
    }
}

#[async_trait]
impl ProfileEngine for ObserverProfileEngine {
    fn name(&self) -> &str {
        "observer"
    }

    #[instrument(skip_all, fields(engine = self.name(), requests = requests.len()))]
    async fn do_profile(
        &self,
        datasource: &DataSource,
        requests: &[ProfileRequest],
        _requirements: &ProfileNonFunctionalRequirements,
    ) -> Result<ProfileResponse> {
        let mut response = ProfileResponse::new();

        for request in requests {
            for statistic in &request.statistics {
                let fq_name = statistic.fq_name();
                let columns = match Self::supported_columns(statistic, request) {
                    Some(columns) => columns,
                    None => {
                        response.insert(
                            fq_name,
                            StatisticResult::unsuccessful(
                                UnsuccessfulKind::Unsupported,
                                Some(format!("Unsupported statistic spec: {statistic:?}")),
                                None,
                            ),
                        );
                        continue;
                    }
                };

                self.report.record_issued(self.name());
                match self
                    .observer
                    .observe_distinct_count(datasource, &request.batch, columns)
                    .await
                {
                    Ok(value) => {
                        self.report.record_successful(self.name());
                        response.insert(fq_name, StatisticResult::success(value));
                    }
                    Err(e) => {
                        self.report
                            .record_unsuccessful(self.name(), UnsuccessfulKind::Failure);
                        warn!(batch = %request.batch.fq_dataset_name, error = %e, "observation failed");
                        response.insert(
                            fq_name,
                            StatisticResult::unsuccessful(
                                UnsuccessfulKind::Failure,
                                Some(format!(
                                    "distinct-count observation failed for batch '{}'",
                                    request.batch.fq_dataset_name
                                )),
                                Some(e.to_string()),
                            ),
                        );
                    }
                }
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProfileError;
    use crate::model::{BatchSpec, DataSourceKind, StatValue, TypedStatistic};

    struct FixedObserver {
        value: Option<i64>,
    }

    #[async_trait]
    impl StatisticObserver for FixedObserver {
        async fn observe_distinct_count(
            &self,
            _datasource: &DataSource,
            _batch: &BatchSpec,
            _columns: &[String],
        ) -> Result<StatValue> {
            match self.value {
                Some(v) => Ok(StatValue::Long(v)),
                None => Err(ProfileError::query_execution("observer unavailable")),
            }
        }
    }

    fn distinct(fq_name: &str) -> StatisticSpec {
        TypedStatistic::new(
            fq_name,
            StatisticType::ColumnDistinctCount,
            vec!["id".to_string()],
        )
        .unwrap()
        .into()
    }

    fn datasource() -> DataSource {
        DataSource::new(DataSourceKind::Snowflake, "snowflake://example")
    }

    #[tokio::test]
    async fn answers_exact_distinct_counts_on_whole_tables() {
        let engine = ObserverProfileEngine::new(Arc::new(FixedObserver { value: Some(42) }));
        let requests = vec![ProfileRequest::new(
            BatchSpec::new("db.schema.t"),
            vec![distinct("fq_stat1")],
        )];

        let response = engine
            .profile(
                &datasource(),
                &requests,
                &ProfileNonFunctionalRequirements::default(),
            )
            .await
            .unwrap();
        assert_eq!(response.get("fq_stat1"), Some(&StatisticResult::success(42i64)));
    }

    #[tokio::test]
    async fn sampled_batches_are_unsupported() {
        let engine = ObserverProfileEngine::new(Arc::new(FixedObserver { value: Some(42) }));
        let requests = vec![ProfileRequest::new(
            BatchSpec::new("db.schema.t").with_sample(100),
            vec![distinct("fq_stat1")],
        )];

        let response = engine
            .profile(
                &datasource(),
                &requests,
                &ProfileNonFunctionalRequirements::default(),
            )
            .await
            .unwrap();
        match response.get("fq_stat1") {
            Some(StatisticResult::Unsuccessful(u)) => {
                assert_eq!(u.kind, UnsuccessfulKind::Unsupported)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn approximate_specs_are_unsupported() {
        let engine = ObserverProfileEngine::new(Arc::new(FixedObserver { value: Some(42) }));
        let approximate: StatisticSpec = TypedStatistic::new(
            "fq_stat1",
            StatisticType::ColumnDistinctCount,
            vec!["id".to_string()],
        )
        .unwrap()
        .approximate()
        .into();
        let requests = vec![ProfileRequest::new(
            BatchSpec::new("db.schema.t"),
            vec![approximate],
        )];

        let response = engine
            .profile(
                &datasource(),
                &requests,
                &ProfileNonFunctionalRequirements::default(),
            )
            .await
            .unwrap();
        match response.get("fq_stat1") {
            Some(StatisticResult::Unsuccessful(u)) => {
                assert_eq!(u.kind, UnsuccessfulKind::Unsupported)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn observation_errors_become_failures() {
        let engine = ObserverProfileEngine::new(Arc::new(FixedObserver { value: None }));
        let requests = vec![ProfileRequest::new(
            BatchSpec::new("db.schema.t"),
            vec![distinct("fq_stat1")],
        )];

        let response = engine
            .profile(
                &datasource(),
                &requests,
                &ProfileNonFunctionalRequirements::default(),
            )
            .await
            .unwrap();
        match response.get("fq_stat1") {
            Some(StatisticResult::Unsuccessful(u)) => {
                assert_eq!(u.kind, UnsuccessfulKind::Failure);
                assert!(u.cause.is_some());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
