//! Full-scan row-count leaf engine, gated by the expensiveness policy.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::engine::ProfileEngine;
use crate::error::Result;
use crate::exec::ConnectionProvider;
use crate::model::{
    DataSource, ProfileNonFunctionalRequirements, ProfileRequest, ProfileResponse, StatisticResult,
    StatisticSpec, StatisticType, UnsuccessfulKind,
};
use crate::report::ProfileReport;
use crate::sql::{
    dialect_table_name, sql_safe_alias, DialectTranspiler, GenericTranspiler, SelectColumn,
    SelectStatement,
};

/// Leaf engine that computes table row counts with `COUNT(*)` full scans.
///
/// Full scans are the expensive way to count rows, so this engine honors
/// the expensiveness policy: when constrained, every supported statistic is
/// marked skipped without issuing any query. When unlimited, each
/// table-level statistic issues its own single-column `COUNT(*)` query per
/// batch. Everything that is not a table row count is unsupported.
pub struct RowCountProfileEngine {
    provider: Arc<dyn ConnectionProvider>,
    transpiler: Arc<dyn DialectTranspiler>,
    report: Arc<ProfileReport>,
}

impl RowCountProfileEngine {
    /// Creates an engine with the default transpiler and a private report.
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            provider,
            transpiler: Arc::new(GenericTranspiler),
            report: Arc::new(ProfileReport::new()),
        }
    }

    /// Shares an externally-owned report for cross-engine aggregation.
    pub fn with_report(mut self, report: Arc<ProfileReport>) -> Self {
        self.report = report;
        self
    }

    /// Whether this engine can compute the given spec.
    pub fn is_statistic_supported(statistic: &StatisticSpec) -> bool {
        matches!(
            statistic,
            StatisticSpec::Typed(typed) if typed.statistic == StatisticType::TableRowCount
        )
    }

    async fn count_rows(
        &self,
        datasource: &DataSource,
        request: &ProfileRequest,
        alias: &str,
    ) -> Result<Option<crate::model::StatValue>> {
        let statement = SelectStatement {
            columns: vec![SelectColumn {
                expr: "COUNT(*)".to_string(),
                alias: alias.to_string(),
            }],
            table: dialect_table_name(&request.batch.fq_dataset_name),
            sample: request.batch.sample,
        };
        let sql = self
            .transpiler
            .transpile(&statement, datasource.kind.into())?;
        debug!(sql = %sql, "executing row-count statement");
        let executor = self.provider.connect(datasource).await?;
        self.report.record_issued(self.name());
        let rows = executor.execute(&sql).await?;

        Ok(rows.first().and_then(|row| {
            row.iter()
                .find(|(column, _)| column.to_lowercase() == alias)
                .map(|(_, value)| value.clone())
        }))
    }
}

#[async_trait]
impl ProfileEngine for RowCountProfileEngine {
    fn name(&self) -> &str {
        "row_count"
    }

    #[instrument(skip_all, fields(engine = self.name(), requests = requests.len()))]
    async fn do_profile(
        &self,
        datasource: &DataSource,
        requests: &[ProfileRequest],
        requirements: &ProfileNonFunctionalRequirements,
    ) -> Result<ProfileResponse> {
        let mut response = ProfileResponse::new();

        for request in requests {
            for statistic in &request.statistics {
                let fq_name = statistic.fq_name();

                if !Self::is_statistic_supported(statistic) {
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

                if !requirements.allows_full_scans() {
                    self.report
                        .record_unsuccessful(self.name(), UnsuccessfulKind::Skipped);
                    response.insert(
                        fq_name,
                        StatisticResult::unsuccessful(
                            UnsuccessfulKind::Skipped,
                            Some(format!(
                                "full-table scan for '{fq_name}' skipped under constrained \
                                 expensiveness policy"
                            )),
                            None,
                        ),
                    );
                    continue;
                }

                let alias = sql_safe_alias(fq_name);
                match self.count_rows(datasource, request, &alias).await {
                    Ok(Some(value)) => {
                        self.report.record_successful(self.name());
                        response.insert(fq_name, StatisticResult::success(value));
                    }
                    Ok(None) => {
                        self.report
                            .record_unsuccessful(self.name(), UnsuccessfulKind::Failure);
                        response.insert(
                            fq_name,
                            StatisticResult::unsuccessful(
                                UnsuccessfulKind::Failure,
                                Some("row-count query returned no rows".to_string()),
                                None,
                            ),
                        );
                    }
                    Err(e) => {
                        self.report
                            .record_unsuccessful(self.name(), UnsuccessfulKind::Failure);
                        warn!(batch = %request.batch.fq_dataset_name, error = %e, "row count failed");
                        response.insert(
                            fq_name,
                            StatisticResult::unsuccessful(
                                UnsuccessfulKind::Failure,
                                Some(format!(
                                    "row count failed for batch '{}'",
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
