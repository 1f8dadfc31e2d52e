//! SQL-generating leaf engine.
//!
//! Turns the supported statistics of each batch into a single generic
//! SELECT statement, executes it once through the connection provider, and
//! maps result columns back to fully-qualified statistic names through a
//! reverse alias table.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::engine::ProfileEngine;
use crate::error::Result;
use crate::exec::{ConnectionProvider, Row};
use crate::logging::{truncate_field, LogConfig};
use crate::model::collections::failed_response_for_request;
use crate::model::{
    DataSource, ProfileNonFunctionalRequirements, ProfileRequest, ProfileResponse, StatisticResult,
    StatisticSpec, StatisticType, UnsuccessfulKind,
};
use crate::report::ProfileReport;
use crate::sql::{
    dialect_table_name, sql_safe_alias, DialectTranspiler, GenericTranspiler, SelectColumn,
    SelectStatement,
};

/// Leaf engine that compiles column-level distinct counts and custom SQL
/// aggregates into one SELECT per batch.
///
/// Everything else, table-level statistics in particular, is reported
/// unsupported so a fallback chain can route it to a cheaper engine.
pub struct SqlProfileEngine {
    provider: Arc<dyn ConnectionProvider>,
    transpiler: Arc<dyn DialectTranspiler>,
    report: Arc<ProfileReport>,
    log: LogConfig,
}

impl SqlProfileEngine {
    /// Creates an engine with the default transpiler and a private report.
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            provider,
            transpiler: Arc::new(GenericTranspiler),
            report: Arc::new(ProfileReport::new()),
            log: LogConfig::default(),
        }
    }

    /// Swaps in a custom dialect transpiler.
    pub fn with_transpiler(mut self, transpiler: Arc<dyn DialectTranspiler>) -> Self {
        self.transpiler = transpiler;
        self
    }

    /// Adjusts how much generated SQL reaches the logs.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Shares an externally-owned report for cross-engine aggregation.
    pub fn with_report(mut self, report: Arc<ProfileReport>) -> Self {
        self.report = report;
        self
    }

    /// Whether this engine can compile the given spec into a select column.
    pub fn is_statistic_supported(statistic: &StatisticSpec) -> bool {
        match statistic {
            StatisticSpec::Typed(typed) => {
                typed.statistic == StatisticType::ColumnDistinctCount
            }
            StatisticSpec::Custom(_) => true,
        }
    }

    /// Compiles a supported spec into its aggregate expression.
    fn select_expr(statistic: &StatisticSpec) -> String {
        match statistic {
            StatisticSpec::Typed(typed) => {
                let columns = typed.columns.join(", ");
                // APPROX_COUNT_DISTINCT is single-argument on both backends;
                // multi-column approximate falls back to the exact form.
                if typed.approximate && typed.columns.len() == 1 {
                    format!("APPROX_COUNT_DISTINCT({columns})")
                } else {
                    format!("COUNT(DISTINCT {columns})")
                }
            }
            StatisticSpec::Custom(custom) => custom.sql.clone(),
        }
    }

    async fn execute_statement(
        &self,
        datasource: &DataSource,
        statement: &SelectStatement,
    ) -> Result<Vec<Row>> {
        let sql = self
            .transpiler
            .transpile(statement, datasource.kind.into())?;
        if self.log.log_statements {
            debug!(
                sql = %truncate_field(&sql, self.log.max_field_length),
                "executing generated statement"
            );
        }
        let executor = self.provider.connect(datasource).await?;
        self.report.record_issued(self.name());
        executor.execute(&sql).await
    }

    /// Decodes the first result row back into per-statistic successes.
    ///
    /// Statistics whose alias is missing from the row are marked failed;
    /// additional rows are ignored (aggregates are expected to be scalar
    /// per batch).
    fn decode_row(
        &self,
        rows: &[Row],
        aliases: &HashMap<String, String>,
        response: &mut ProfileResponse,
    ) {
        let first_row: HashMap<String, _> = match rows.first() {
            Some(row) => row
                .iter()
                .map(|(column, value)| (column.to_lowercase(), value))
                .collect(),
            None => HashMap::new(),
        };
        if rows.len() > 1 {
            warn!(rows = rows.len(), "statement returned multiple rows; reading the first");
        }

        for (alias, fq_name) in aliases {
            match first_row.get(alias) {
                Some(value) => {
                    response.insert(fq_name.clone(), StatisticResult::success((*value).clone()));
                }
                None => {
                    response.insert(
                        fq_name.clone(),
                        StatisticResult::unsuccessful(
                            UnsuccessfulKind::Failure,
                            Some(format!("result column '{alias}' missing from response row")),
                            None,
                        ),
                    );
                }
            }
        }
    }
}

#[async_trait]
impl ProfileEngine for SqlProfileEngine {
    fn name(&self) -> &str {
        "sql"
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
            // Reverse lookup table: backend-safe alias -> fq-name.
            let mut aliases: HashMap<String, String> = HashMap::new();
            let mut columns: Vec<SelectColumn> = Vec::new();
            let mut supported: Vec<StatisticSpec> = Vec::new();

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

                let alias = sql_safe_alias(fq_name);
                if let Some(colliding) = aliases.get(&alias) {
                    response.insert(
                        fq_name,
                        StatisticResult::unsuccessful(
                            UnsuccessfulKind::Failure,
                            Some(format!(
                                "normalized alias '{alias}' collides with statistic '{colliding}'"
                            )),
                            None,
                        ),
                    );
                    continue;
                }

                columns.push(SelectColumn {
                    expr: Self::select_expr(statistic),
                    alias: alias.clone(),
                });
                aliases.insert(alias, fq_name.to_string());
                supported.push(statistic.clone());
            }

            if columns.is_empty() {
                continue;
            }

            let statement = SelectStatement {
                columns,
                table: dialect_table_name(&request.batch.fq_dataset_name),
                sample: request.batch.sample,
            };

            match self.execute_statement(datasource, &statement).await {
                Ok(rows) => {
                    self.report.record_successful(self.name());
                    self.decode_row(&rows, &aliases, &mut response);
                }
                Err(e) => {
                    // A failing batch must not abort its siblings.
                    self.report
                        .record_unsuccessful(self.name(), UnsuccessfulKind::Failure);
                    warn!(batch = %request.batch.fq_dataset_name, error = %e, "batch query failed");
                    response.merge(failed_response_for_request(
                        &ProfileRequest::new(request.batch.clone(), supported),
                        UnsuccessfulKind::Failure,
                        Some(format!(
                            "query failed for batch '{}'",
                            request.batch.fq_dataset_name
                        )),
                        Some(e.to_string()),
                    ));
                }
            }
        }

        Ok(response)
    }
}
