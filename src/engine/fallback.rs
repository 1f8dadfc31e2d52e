//! Sequential fallback over an ordered chain of engines.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::engine::ProfileEngine;
use crate::error::Result;
use crate::model::collections::split_response_by_outcome;
use crate::model::{
    DataSource, ProfileNonFunctionalRequirements, ProfileRequest, ProfileResponse,
};

/// Composite engine that tries each inner engine in order.
///
/// The first engine sees every request; only the statistics it marked
/// unsuccessful stay pending for the next engine, and so on until the
/// chain is exhausted or nothing is pending. Because response merging is
/// last-write-wins, a later engine's success overwrites an earlier
/// engine's failure for the same statistic, and the final unsuccessful
/// entries reflect the last engine that attempted them.
pub struct FallbackProfileEngine {
    engines: Vec<Arc<dyn ProfileEngine>>,
}

impl FallbackProfileEngine {
    /// Creates a fallback chain over the given engines, tried in order.
    pub fn new(engines: Vec<Arc<dyn ProfileEngine>>) -> Self {
        Self { engines }
    }
}

#[async_trait]
impl ProfileEngine for FallbackProfileEngine {
    fn name(&self) -> &str {
        "fallback"
    }

    #[instrument(skip_all, fields(engine = self.name(), chain = self.engines.len()))]
    async fn do_profile(
        &self,
        datasource: &DataSource,
        requests: &[ProfileRequest],
        requirements: &ProfileNonFunctionalRequirements,
    ) -> Result<ProfileResponse> {
        let mut response = ProfileResponse::new();

        // Owned working copy so the caller's request list is never mutated.
        let mut pending: Vec<ProfileRequest> = requests.to_vec();

        for engine in &self.engines {
            if pending.is_empty() {
                break;
            }

            let engine_response = engine
                .do_profile(datasource, &pending, requirements)
                .await?;
            let (successes, unsuccessfuls) = split_response_by_outcome(&engine_response);

            if !successes.is_empty() {
                info!(
                    engine = engine.name(),
                    resolved = successes.len(),
                    "engine resolved statistics"
                );
                response.merge(successes);
            }

            if unsuccessfuls.is_empty() {
                // Everything resolved; skip the remaining engines.
                break;
            }

            // Record the current best-known status; the next engine in the
            // chain overwrites whatever it manages to compute.
            response.merge(unsuccessfuls.clone());

            let mut still_pending: Vec<ProfileRequest> = Vec::new();
            for request in &pending {
                let remaining: Vec<_> = request
                    .statistics
                    .iter()
                    .filter(|statistic| unsuccessfuls.contains(statistic.fq_name()))
                    .cloned()
                    .collect();
                if !remaining.is_empty() {
                    still_pending.push(ProfileRequest::new(request.batch.clone(), remaining));
                }
            }
            pending = still_pending;
            debug!(pending = pending.len(), "requests pending for next engine");
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        BatchSpec, CustomStatistic, DataSourceKind, StatisticResult, StatisticSpec,
        UnsuccessfulKind,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine that replays a canned response and counts invocations.
    struct FixedResponseEngine {
        response: ProfileResponse,
        calls: AtomicUsize,
    }

    impl FixedResponseEngine {
        fn new(response: ProfileResponse) -> Self {
            Self {
                response,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProfileEngine for FixedResponseEngine {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn do_profile(
            &self,
            _datasource: &DataSource,
            _requests: &[ProfileRequest],
            _requirements: &ProfileNonFunctionalRequirements,
        ) -> Result<ProfileResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn statistic(fq_name: &str) -> StatisticSpec {
        CustomStatistic::new(fq_name, "1").unwrap().into()
    }

    fn request(batch: &str, fq_names: &[&str]) -> ProfileRequest {
        ProfileRequest::new(
            BatchSpec::new(batch),
            fq_names.iter().map(|n| statistic(n)).collect(),
        )
    }

    fn datasource() -> DataSource {
        DataSource::new(DataSourceKind::Snowflake, "snowflake://example")
    }

    fn success(value: i64) -> StatisticResult {
        StatisticResult::success(value)
    }

    fn unsuccessful(kind: UnsuccessfulKind) -> StatisticResult {
        StatisticResult::unsuccessful(kind, None, None)
    }

    #[tokio::test]
    async fn single_successful_engine_resolves_everything() {
        let mut canned = ProfileResponse::new();
        canned.insert("fq_stat1", success(1));

        let chain = FallbackProfileEngine::new(vec![Arc::new(FixedResponseEngine::new(canned))]);
        let response = chain
            .profile(
                &datasource(),
                &[request("batch1", &["fq_stat1"])],
                &ProfileNonFunctionalRequirements::default(),
            )
            .await
            .unwrap();

        assert_eq!(response.get("fq_stat1"), Some(&success(1)));
        assert_eq!(response.len(), 1);
    }

    #[tokio::test]
    async fn later_engines_overwrite_earlier_unsuccessfuls() {
        let requests = vec![
            request("batch1", &["fq_stat_1a", "fq_stat_1b", "fq_stat_1c"]),
            request("batch2", &["fq_stat_2a", "fq_stat_2b", "fq_stat_2c"]),
            request("batch3", &["fq_stat_3a", "fq_stat_3b", "fq_stat_3c"]),
        ];

        let mut first = ProfileResponse::new();
        first.insert("fq_stat_1a", success(1));
        first.insert("fq_stat_1b", success(1));
        first.insert("fq_stat_1c", success(1));
        first.insert("fq_stat_2a", success(1));
        first.insert("fq_stat_2b", unsuccessful(UnsuccessfulKind::Unsupported));
        first.insert("fq_stat_2c", unsuccessful(UnsuccessfulKind::Unsupported));
        first.insert("fq_stat_3a", success(1));
        first.insert("fq_stat_3b", unsuccessful(UnsuccessfulKind::Failure));
        first.insert("fq_stat_3c", unsuccessful(UnsuccessfulKind::Failure));

        let mut second = ProfileResponse::new();
        second.insert("fq_stat_2b", success(2));
        second.insert("fq_stat_2c", unsuccessful(UnsuccessfulKind::Failure));
        second.insert("fq_stat_3b", unsuccessful(UnsuccessfulKind::Failure));
        second.insert("fq_stat_3c", success(3));

        let mut third = ProfileResponse::new();
        third.insert("fq_stat_2c", success(3));
        third.insert("fq_stat_3b", success(3));

        let chain = FallbackProfileEngine::new(vec![
            Arc::new(FixedResponseEngine::new(first)),
            Arc::new(FixedResponseEngine::new(second)),
            Arc::new(FixedResponseEngine::new(third)),
        ]);

        let response = chain
            .profile(
                &datasource(),
                &requests,
                &ProfileNonFunctionalRequirements::default(),
            )
            .await
            .unwrap();

        assert_eq!(response.len(), 9);
        assert_eq!(response.get("fq_stat_2b"), Some(&success(2)));
        assert_eq!(response.get("fq_stat_2c"), Some(&success(3)));
        assert_eq!(response.get("fq_stat_3b"), Some(&success(3)));
        assert_eq!(response.get("fq_stat_3c"), Some(&success(3)));
    }

    #[tokio::test]
    async fn exhausted_chain_keeps_last_unsuccessful_status() {
        let requests = vec![
            request("batch1", &["fq_stat_1a"]),
            request("batch2", &["fq_stat_2b", "fq_stat_2c"]),
        ];

        let mut first = ProfileResponse::new();
        first.insert("fq_stat_1a", success(1));
        first.insert("fq_stat_2b", unsuccessful(UnsuccessfulKind::Unsupported));
        first.insert("fq_stat_2c", unsuccessful(UnsuccessfulKind::Unsupported));

        let mut second = ProfileResponse::new();
        second.insert("fq_stat_2b", unsuccessful(UnsuccessfulKind::Unsupported));
        second.insert("fq_stat_2c", unsuccessful(UnsuccessfulKind::Failure));

        let chain = FallbackProfileEngine::new(vec![
            Arc::new(FixedResponseEngine::new(first)),
            Arc::new(FixedResponseEngine::new(second)),
        ]);

        let response = chain
            .profile(
                &datasource(),
                &requests,
                &ProfileNonFunctionalRequirements::default(),
            )
            .await
            .unwrap();

        assert_eq!(response.get("fq_stat_1a"), Some(&success(1)));
        assert_eq!(
            response.get("fq_stat_2b"),
            Some(&unsuccessful(UnsuccessfulKind::Unsupported))
        );
        // The second engine's failure kind wins over the first's unsupported.
        assert_eq!(
            response.get("fq_stat_2c"),
            Some(&unsuccessful(UnsuccessfulKind::Failure))
        );
    }

    #[tokio::test]
    async fn early_exit_skips_remaining_engines() {
        let mut first = ProfileResponse::new();
        first.insert("fq_stat1", success(1));

        let untouched = Arc::new(FixedResponseEngine::new(ProfileResponse::new()));
        let chain = FallbackProfileEngine::new(vec![
            Arc::new(FixedResponseEngine::new(first)),
            Arc::clone(&untouched) as Arc<dyn ProfileEngine>,
        ]);

        chain
            .profile(
                &datasource(),
                &[request("batch1", &["fq_stat1"])],
                &ProfileNonFunctionalRequirements::default(),
            )
            .await
            .unwrap();

        assert_eq!(untouched.calls.load(Ordering::SeqCst), 0);
    }
}
