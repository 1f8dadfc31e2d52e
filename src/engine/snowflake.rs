//! Snowflake composite engine.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

use crate::engine::{ProfileEngine, RowCountProfileEngine, SqlProfileEngine};
use crate::error::Result;
use crate::exec::ConnectionProvider;
use crate::model::collections::group_by_statistic_predicate;
use crate::model::{
    DataSource, ProfileNonFunctionalRequirements, ProfileRequest, ProfileResponse,
};
use crate::report::ProfileReport;

/// The Snowflake composite: table-level statistics go to the row-count
/// engine (which defers to the expensiveness policy), everything else is
/// compiled into per-batch SELECTs by the SQL engine.
///
/// Snowflake has no free metadata shortcut equivalent to BigQuery's
/// `__TABLES__`, so row counts are honest `COUNT(*)` scans.
pub struct SnowflakeProfileEngine {
    row_count: RowCountProfileEngine,
    sql: SqlProfileEngine,
}

impl SnowflakeProfileEngine {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self::with_report(provider, Arc::new(ProfileReport::new()))
    }

    /// Builds the composite with a shared report across both inner engines.
    pub fn with_report(provider: Arc<dyn ConnectionProvider>, report: Arc<ProfileReport>) -> Self {
        Self {
            row_count: RowCountProfileEngine::new(Arc::clone(&provider))
                .with_report(Arc::clone(&report)),
            sql: SqlProfileEngine::new(provider).with_report(report),
        }
    }
}

#[async_trait]
impl ProfileEngine for SnowflakeProfileEngine {
    fn name(&self) -> &str {
        "snowflake"
    }

    #[instrument(skip_all, fields(engine = self.name(), requests = requests.len()))]
    async fn do_profile(
        &self,
        datasource: &DataSource,
        requests: &[ProfileRequest],
        requirements: &ProfileNonFunctionalRequirements,
    ) -> Result<ProfileResponse> {
        let routed =
            group_by_statistic_predicate(requests, |statistic| statistic.is_table_level(), true);

        // The two halves touch disjoint statistics; run them side by side.
        let row_count_half = async {
            match routed.get(&true) {
                Some(table_level) => {
                    self.row_count
                        .do_profile(datasource, table_level, requirements)
                        .await
                }
                None => Ok(ProfileResponse::new()),
            }
        };
        let sql_half = async {
            match routed.get(&false) {
                Some(column_level) => {
                    self.sql
                        .do_profile(datasource, column_level, requirements)
                        .await
                }
                None => Ok(ProfileResponse::new()),
            }
        };
        let (row_count_response, sql_response) = futures::try_join!(row_count_half, sql_half)?;

        let mut response = ProfileResponse::new();
        response.merge(row_count_response);
        response.merge(sql_response);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{QueryExecutor, Row};
    use crate::model::{
        BatchSpec, DataSourceKind, StatValue, StatisticResult, StatisticSpec, StatisticType,
        TypedStatistic, UnsuccessfulKind,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Executor that answers any statement with one row holding the given
    /// value under every alias the statement projects.
    struct EchoExecutor {
        value: i64,
        statements: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl QueryExecutor for EchoExecutor {
        async fn execute(&self, sql: &str) -> Result<Vec<Row>> {
            self.statements.lock().unwrap().push(sql.to_string());
            let mut row = Row::new();
            // Aliases sit between " AS " and the following delimiter.
            let mut rest = sql;
            while let Some(idx) = rest.find(" AS ") {
                rest = &rest[idx + 4..];
                let end = rest
                    .find([',', ' '])
                    .unwrap_or(rest.len());
                row.insert(rest[..end].to_string(), StatValue::Long(self.value));
            }
            Ok(vec![row])
        }
    }

    struct EchoProvider {
        executor: Arc<EchoExecutor>,
    }

    #[async_trait]
    impl ConnectionProvider for EchoProvider {
        async fn connect(&self, _datasource: &DataSource) -> Result<Arc<dyn QueryExecutor>> {
            Ok(Arc::clone(&self.executor) as Arc<dyn QueryExecutor>)
        }
    }

    fn provider(value: i64) -> (Arc<EchoProvider>, Arc<Mutex<Vec<String>>>) {
        let statements = Arc::new(Mutex::new(Vec::new()));
        let executor = Arc::new(EchoExecutor {
            value,
            statements: Arc::clone(&statements),
        });
        (Arc::new(EchoProvider { executor }), statements)
    }

    fn datasource() -> DataSource {
        DataSource::new(DataSourceKind::Snowflake, "snowflake://example")
    }

    fn row_count(fq_name: &str) -> StatisticSpec {
        TypedStatistic::new(fq_name, StatisticType::TableRowCount, vec![])
            .unwrap()
            .into()
    }

    fn distinct(fq_name: &str, column: &str) -> StatisticSpec {
        TypedStatistic::new(
            fq_name,
            StatisticType::ColumnDistinctCount,
            vec![column.to_string()],
        )
        .unwrap()
        .into()
    }

    #[tokio::test]
    async fn routes_table_and_column_statistics() {
        let (provider, statements) = provider(68);
        let engine = SnowflakeProfileEngine::new(provider);

        let requests = vec![ProfileRequest::new(
            BatchSpec::new("db.schema.orders"),
            vec![row_count("fq_rows"), distinct("fq_ids", "id")],
        )];

        let response = engine
            .profile(
                &datasource(),
                &requests,
                &ProfileNonFunctionalRequirements::default(),
            )
            .await
            .unwrap();

        assert_eq!(response.get("fq_rows"), Some(&StatisticResult::success(68i64)));
        assert_eq!(response.get("fq_ids"), Some(&StatisticResult::success(68i64)));

        let statements = statements.lock().unwrap();
        assert_eq!(statements.len(), 2);
        assert!(statements.iter().any(|s| s.contains("COUNT(*)")));
        assert!(statements.iter().any(|s| s.contains("COUNT(DISTINCT id)")));
    }

    #[tokio::test]
    async fn constrained_policy_skips_row_counts_but_not_sql() {
        let (provider, statements) = provider(7);
        let engine = SnowflakeProfileEngine::new(provider);

        let requests = vec![ProfileRequest::new(
            BatchSpec::new("db.schema.orders"),
            vec![row_count("fq_rows"), distinct("fq_ids", "id")],
        )];

        let response = engine
            .profile(
                &datasource(),
                &requests,
                &ProfileNonFunctionalRequirements::constrained(),
            )
            .await
            .unwrap();

        match response.get("fq_rows") {
            Some(StatisticResult::Unsuccessful(u)) => {
                assert_eq!(u.kind, UnsuccessfulKind::Skipped)
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(response.get("fq_ids"), Some(&StatisticResult::success(7i64)));

        // Only the SQL statement ran.
        assert_eq!(statements.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn shared_report_aggregates_both_engines() {
        let (provider, _) = provider(1);
        let report = Arc::new(ProfileReport::new());
        let engine = SnowflakeProfileEngine::with_report(provider, Arc::clone(&report));

        let requests = vec![ProfileRequest::new(
            BatchSpec::new("db.schema.orders"),
            vec![row_count("fq_rows"), distinct("fq_ids", "id")],
        )];

        engine
            .profile(
                &datasource(),
                &requests,
                &ProfileNonFunctionalRequirements::default(),
            )
            .await
            .unwrap();

        let issued: HashMap<String, u64> = report.snapshot().issued_by_engine;
        assert_eq!(issued.get("row_count"), Some(&1));
        assert_eq!(issued.get("sql"), Some(&1));
    }
}
