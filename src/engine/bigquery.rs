//! BigQuery-specific engines.
//!
//! BigQuery keeps per-table row counts in dataset metadata, so whole-table
//! row counts are answerable with one cheap `__TABLES__` scan per dataset
//! instead of a full-table `COUNT(*)`. The composite engine routes those
//! statistics to [`InformationSchemaProfileEngine`] and everything else to
//! a parallel SQL dispatcher batched per dataset.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::engine::{ParallelProfileEngine, ProfileEngine, SqlProfileEngine};
use crate::error::Result;
use crate::exec::ConnectionProvider;
use crate::model::collections::{group_by_batch_predicate, group_by_statistic_predicate};
use crate::model::{
    DataSource, ProfileNonFunctionalRequirements, ProfileRequest, ProfileResponse, StatValue,
    StatisticResult, StatisticSpec, StatisticType, UnsuccessfulKind,
};
use crate::report::ProfileReport;

/// Extracts the BigQuery dataset from a `project.dataset.table` name.
fn dataset_segment(fq_dataset_name: &str) -> Option<&str> {
    let mut segments = fq_dataset_name.split('.');
    let _project = segments.next()?;
    segments.next()
}

/// Extracts the BigQuery table from a `project.dataset.table` name.
fn table_segment(fq_dataset_name: &str) -> Option<&str> {
    fq_dataset_name.split('.').nth(2)
}

/// Leaf engine that reads whole-table row counts from BigQuery's
/// `__TABLES__` dataset metadata.
///
/// One metadata query per distinct dataset covers every requested table in
/// it. Tables absent from the metadata and batch names that are not
/// `project.dataset.table` shaped are failures; anything that is not a
/// whole-table row count is unsupported.
pub struct InformationSchemaProfileEngine {
    provider: Arc<dyn ConnectionProvider>,
    report: Arc<ProfileReport>,
}

impl InformationSchemaProfileEngine {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            provider,
            report: Arc::new(ProfileReport::new()),
        }
    }

    /// Shares an externally-owned report for cross-engine aggregation.
    pub fn with_report(mut self, report: Arc<ProfileReport>) -> Self {
        self.report = report;
        self
    }

    /// Whether this engine can answer the statistic for the given request.
    pub fn is_request_supported(statistic: &StatisticSpec, request: &ProfileRequest) -> bool {
        matches!(
            statistic,
            StatisticSpec::Typed(typed) if typed.statistic == StatisticType::TableRowCount
        ) && request.batch.is_whole_table()
    }

    /// Fetches `table -> row count` for one dataset.
    async fn dataset_row_counts(
        &self,
        datasource: &DataSource,
        dataset: &str,
    ) -> Result<HashMap<String, StatValue>> {
        let sql = format!("SELECT table_id, row_count FROM {dataset}.__TABLES__");
        debug!(sql = %sql, "reading dataset metadata");
        let executor = self.provider.connect(datasource).await?;
        self.report.record_issued(self.name());
        let rows = executor.execute(&sql).await?;

        let mut counts = HashMap::new();
        for row in rows {
            let row: HashMap<String, &StatValue> = row
                .iter()
                .map(|(column, value)| (column.to_lowercase(), value))
                .collect();
            if let (Some(StatValue::Text(table_id)), Some(row_count)) =
                (row.get("table_id").copied(), row.get("row_count"))
            {
                counts.insert(table_id.clone(), (*row_count).clone());
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl ProfileEngine for InformationSchemaProfileEngine {
    fn name(&self) -> &str {
        "bigquery_information_schema"
    }

    #[instrument(skip_all, fields(engine = self.name(), requests = requests.len()))]
    async fn do_profile(
        &self,
        datasource: &DataSource,
        requests: &[ProfileRequest],
        _requirements: &ProfileNonFunctionalRequirements,
    ) -> Result<ProfileResponse> {
        let mut response = ProfileResponse::new();
        let mut supported: Vec<ProfileRequest> = Vec::new();

        for request in requests {
            let mut statistics = Vec::new();
            for statistic in &request.statistics {
                let fq_name = statistic.fq_name();
                if !Self::is_request_supported(statistic, request) {
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
                if dataset_segment(&request.batch.fq_dataset_name).is_none()
                    || table_segment(&request.batch.fq_dataset_name).is_none()
                {
                    response.insert(
                        fq_name,
                        StatisticResult::unsuccessful(
                            UnsuccessfulKind::Failure,
                            Some(format!(
                                "batch name '{}' is not project.dataset.table shaped",
                                request.batch.fq_dataset_name
                            )),
                            None,
                        ),
                    );
                    continue;
                }
                statistics.push(statistic.clone());
            }
            if !statistics.is_empty() {
                supported.push(ProfileRequest::new(request.batch.clone(), statistics));
            }
        }

        // Segment shape was checked above; unwrap-free lookups below default
        // to empty strings that simply miss the metadata map.
        let by_dataset = group_by_batch_predicate(&supported, |batch| {
            dataset_segment(&batch.fq_dataset_name)
                .unwrap_or_default()
                .to_string()
        });

        for (dataset, dataset_requests) in by_dataset {
            match self.dataset_row_counts(datasource, &dataset).await {
                Ok(counts) => {
                    self.report.record_successful(self.name());
                    for request in &dataset_requests {
                        let table =
                            table_segment(&request.batch.fq_dataset_name).unwrap_or_default();
                        for statistic in &request.statistics {
                            match counts.get(table) {
                                Some(value) => {
                                    response.insert(
                                        statistic.fq_name(),
                                        StatisticResult::success(value.clone()),
                                    );
                                }
                                None => {
                                    response.insert(
                                        statistic.fq_name(),
                                        StatisticResult::unsuccessful(
                                            UnsuccessfulKind::Failure,
                                            Some(format!(
                                                "table '{table}' not present in dataset \
                                                 '{dataset}' metadata"
                                            )),
                                            None,
                                        ),
                                    );
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    self.report
                        .record_unsuccessful(self.name(), UnsuccessfulKind::Failure);
                    warn!(dataset = %dataset, error = %e, "dataset metadata query failed");
                    for request in &dataset_requests {
                        for statistic in &request.statistics {
                            response.insert(
                                statistic.fq_name(),
                                StatisticResult::unsuccessful(
                                    UnsuccessfulKind::Failure,
                                    Some(format!("metadata query failed for dataset '{dataset}'")),
                                    Some(e.to_string()),
                                ),
                            );
                        }
                    }
                }
            }
        }

        Ok(response)
    }
}

/// The BigQuery composite: metadata row counts plus parallel SQL for the
/// rest, with SQL work batched so each dataset becomes one unit.
pub struct BigQueryProfileEngine {
    information_schema: InformationSchemaProfileEngine,
    sql: ParallelProfileEngine,
}

impl BigQueryProfileEngine {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self::with_report(provider, Arc::new(ProfileReport::new()))
    }

    /// Builds the composite with a shared report across both inner engines.
    pub fn with_report(provider: Arc<dyn ConnectionProvider>, report: Arc<ProfileReport>) -> Self {
        let sql_leaf = SqlProfileEngine::new(Arc::clone(&provider)).with_report(Arc::clone(&report));
        let sql = ParallelProfileEngine::new(Arc::new(sql_leaf)).with_partitioner(Arc::new(
            |requests: &[ProfileRequest]| {
                group_by_batch_predicate(requests, |batch| {
                    dataset_segment(&batch.fq_dataset_name)
                        .unwrap_or_default()
                        .to_string()
                })
                .into_values()
                .collect()
            },
        ));
        Self {
            information_schema: InformationSchemaProfileEngine::new(provider).with_report(report),
            sql,
        }
    }
}

#[async_trait]
impl ProfileEngine for BigQueryProfileEngine {
    fn name(&self) -> &str {
        "bigquery"
    }

    #[instrument(skip_all, fields(engine = self.name(), requests = requests.len()))]
    async fn do_profile(
        &self,
        datasource: &DataSource,
        requests: &[ProfileRequest],
        requirements: &ProfileNonFunctionalRequirements,
    ) -> Result<ProfileResponse> {
        // Statistics keep their grouping key from the request they rode in
        // on, so whole-table row counts split off and the rest stays joined
        // per batch.
        let routed = group_by_statistic_predicate(
            requests,
            |statistic| {
                matches!(
                    statistic,
                    StatisticSpec::Typed(typed)
                        if typed.statistic == StatisticType::TableRowCount
                )
            },
            true,
        );

        // The two halves touch disjoint statistics; run them side by side.
        let metadata_half = async {
            match routed.get(&true) {
                Some(row_counts) => {
                    self.information_schema
                        .do_profile(datasource, row_counts, requirements)
                        .await
                }
                None => Ok(ProfileResponse::new()),
            }
        };
        let sql_half = async {
            match routed.get(&false) {
                Some(rest) => self.sql.do_profile(datasource, rest, requirements).await,
                None => Ok(ProfileResponse::new()),
            }
        };
        let (metadata_response, sql_response) = futures::try_join!(metadata_half, sql_half)?;

        let mut response = ProfileResponse::new();
        response.merge(metadata_response);
        response.merge(sql_response);
        Ok(response)
    }
}
