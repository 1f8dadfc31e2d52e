//! Pure request-collection algorithms shared by the composite engines.
//!
//! These functions split, regroup, and join [`ProfileRequest`] lists without
//! touching any backend. Ordering rules: statistics that land in the same
//! bucket keep their relative order, batches keep first-seen order, and
//! wherever responses merge the later writer wins.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::error::{ProfileError, Result};
use crate::model::{
    BatchSpec, ProfileRequest, ProfileResponse, StatisticResult, StatisticSpec, UnsuccessfulKind,
};

/// Validates that fully-qualified statistic names are unique across all
/// requests, returning the first duplicate as a configuration error.
pub fn validate_fq_name_uniqueness(requests: &[ProfileRequest]) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    for request in requests {
        for statistic in &request.statistics {
            let fq_name = statistic.fq_name();
            if !seen.insert(fq_name) {
                return Err(ProfileError::DuplicateStatisticName(fq_name.to_string()));
            }
        }
    }
    Ok(())
}

/// Groups requests by the result of a predicate applied to each statistic.
///
/// Every request is exploded into one-statistic-per-request units and
/// bucketed by `predicate(statistic)`. When `group_results` is true,
/// statistics sharing a batch within the same bucket are re-consolidated
/// into multi-statistic requests via [`join_statistics_by_batch`].
pub fn group_by_statistic_predicate<K, F>(
    requests: &[ProfileRequest],
    predicate: F,
    group_results: bool,
) -> HashMap<K, Vec<ProfileRequest>>
where
    K: Eq + Hash,
    F: Fn(&StatisticSpec) -> K,
{
    let mut buckets: HashMap<K, Vec<ProfileRequest>> = HashMap::new();
    for request in requests {
        for statistic in &request.statistics {
            let key = predicate(statistic);
            buckets.entry(key).or_default().push(ProfileRequest::new(
                request.batch.clone(),
                vec![statistic.clone()],
            ));
        }
    }

    if group_results {
        for bucket in buckets.values_mut() {
            *bucket = join_statistics_by_batch(std::mem::take(bucket));
        }
    }

    buckets
}

/// Joins statistics across requests that share a value-equal batch,
/// preserving first-seen batch order.
///
/// Quadratic in the number of distinct batches, which is acceptable at the
/// expected batch cardinality (tens, not millions).
pub fn join_statistics_by_batch(requests: Vec<ProfileRequest>) -> Vec<ProfileRequest> {
    let mut joined: Vec<ProfileRequest> = Vec::new();
    for request in requests {
        match joined.iter_mut().find(|j| j.batch == request.batch) {
            Some(existing) => existing.statistics.extend(request.statistics),
            None => joined.push(request),
        }
    }
    joined
}

/// Groups whole requests (not individual statistics) by a predicate applied
/// to the batch spec, e.g. the warehouse dataset extracted from the
/// fully-qualified batch name.
pub fn group_by_batch_predicate<K, F>(
    requests: &[ProfileRequest],
    predicate: F,
) -> HashMap<K, Vec<ProfileRequest>>
where
    K: Eq + Hash,
    F: Fn(&BatchSpec) -> K,
{
    let mut buckets: HashMap<K, Vec<ProfileRequest>> = HashMap::new();
    for request in requests {
        buckets
            .entry(predicate(&request.batch))
            .or_default()
            .push(request.clone());
    }
    buckets
}

/// Partitions a response's entries into (successes, unsuccessfuls).
pub fn split_response_by_outcome(
    response: &ProfileResponse,
) -> (ProfileResponse, ProfileResponse) {
    let mut successes = ProfileResponse::new();
    let mut unsuccessfuls = ProfileResponse::new();
    for (fq_name, result) in &response.data {
        if result.is_success() {
            successes.insert(fq_name.clone(), result.clone());
        } else {
            unsuccessfuls.insert(fq_name.clone(), result.clone());
        }
    }
    (successes, unsuccessfuls)
}

/// Builds an all-unsuccessful response covering every statistic in the
/// request, tagged with a single kind/message/cause.
///
/// This is the standard way a leaf engine reports a batch-level error
/// against every statistic it was trying to compute.
pub fn failed_response_for_request(
    request: &ProfileRequest,
    kind: UnsuccessfulKind,
    message: Option<String>,
    cause: Option<String>,
) -> ProfileResponse {
    let mut response = ProfileResponse::new();
    for statistic in &request.statistics {
        response.insert(
            statistic.fq_name(),
            StatisticResult::unsuccessful(kind, message.clone(), cause.clone()),
        );
    }
    response
}
