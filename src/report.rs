//! Thread-safe query counters shared across engines.
//!
//! Reporting is best-effort observability and never affects control flow.
//! All mutations take the single internal mutex; reads take it briefly to
//! copy a snapshot, so concurrent readers see an eventually consistent view.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use crate::model::UnsuccessfulKind;

#[derive(Debug, Default)]
struct ReportCounters {
    issued_by_engine: HashMap<String, u64>,
    successful_by_engine: HashMap<String, u64>,
    unsuccessful_by_engine_and_kind: HashMap<(String, UnsuccessfulKind), u64>,
}

/// Process-lifetime counters for issued, successful, and unsuccessful
/// queries, keyed by engine identity.
///
/// Default-constructed per engine unless explicitly shared: composite
/// engines pass their own instance down to children to aggregate counts
/// across the whole engine tree.
///
/// # Example
///
/// ```rust
/// use tablestat::report::ProfileReport;
///
/// let report = ProfileReport::new();
/// report.record_issued("sql");
/// report.record_successful("sql");
/// assert_eq!(report.issued("sql"), 1);
/// assert_eq!(report.successful("sql"), 1);
/// ```
#[derive(Debug, Default)]
pub struct ProfileReport {
    counters: Mutex<ReportCounters>,
}

impl ProfileReport {
    /// Creates a report with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that an engine issued a query.
    pub fn record_issued(&self, engine: &str) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters
                .issued_by_engine
                .entry(engine.to_string())
                .or_default() += 1;
        }
    }

    /// Records that an engine's query completed successfully.
    pub fn record_successful(&self, engine: &str) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters
                .successful_by_engine
                .entry(engine.to_string())
                .or_default() += 1;
        }
    }

    /// Records that an engine's query ended unsuccessfully with the given
    /// kind.
    pub fn record_unsuccessful(&self, engine: &str, kind: UnsuccessfulKind) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters
                .unsuccessful_by_engine_and_kind
                .entry((engine.to_string(), kind))
                .or_default() += 1;
        }
    }

    /// Number of queries issued by the given engine.
    pub fn issued(&self, engine: &str) -> u64 {
        self.counters
            .lock()
            .map(|c| c.issued_by_engine.get(engine).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of successful queries for the given engine.
    pub fn successful(&self, engine: &str) -> u64 {
        self.counters
            .lock()
            .map(|c| c.successful_by_engine.get(engine).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of unsuccessful queries for the given engine and kind.
    pub fn unsuccessful(&self, engine: &str, kind: UnsuccessfulKind) -> u64 {
        self.counters
            .lock()
            .map(|c| {
                c.unsuccessful_by_engine_and_kind
                    .get(&(engine.to_string(), kind))
                    .copied()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Copies the current counter values into a serializable snapshot.
    pub fn snapshot(&self) -> ReportSnapshot {
        let counters = match self.counters.lock() {
            Ok(counters) => counters,
            Err(_) => return ReportSnapshot::default(),
        };
        ReportSnapshot {
            issued_by_engine: counters.issued_by_engine.clone(),
            successful_by_engine: counters.successful_by_engine.clone(),
            unsuccessful_by_engine_and_kind: counters
                .unsuccessful_by_engine_and_kind
                .iter()
                .map(|((engine, kind), count)| (format!("{engine}/{kind}"), *count))
                .collect(),
        }
    }
}

impl fmt::Display for ProfileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        write!(
            f,
            "ProfileReport(issued={:?}, successful={:?}, unsuccessful={:?})",
            snapshot.issued_by_engine,
            snapshot.successful_by_engine,
            snapshot.unsuccessful_by_engine_and_kind
        )
    }
}

/// A point-in-time copy of the report counters, suitable for display or
/// export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSnapshot {
    /// Issued query counts by engine name.
    pub issued_by_engine: HashMap<String, u64>,
    /// Successful query counts by engine name.
    pub successful_by_engine: HashMap<String, u64>,
    /// Unsuccessful query counts keyed by `engine/kind`.
    pub unsuccessful_by_engine_and_kind: HashMap<String, u64>,
}
