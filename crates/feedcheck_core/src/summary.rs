//! Result aggregation.
//!
//! The [`ResultAggregator`] collects outcomes from concurrently running
//! checkers and produces an immutable [`ValidationSummary`] for reporting.

use crate::{CheckKind, CheckOutcome, OutcomeStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Per-status counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Outcomes with status PASS
    pub pass: usize,
    /// Outcomes with status FAIL
    pub fail: usize,
    /// Outcomes with status ERROR
    pub error: usize,
    /// Outcomes with status SKIPPED
    pub skipped: usize,
}

impl StatusCounts {
    /// Increments the counter for `status`.
    pub fn record(&mut self, status: OutcomeStatus) {
        match status {
            OutcomeStatus::Pass => self.pass += 1,
            OutcomeStatus::Fail => self.fail += 1,
            OutcomeStatus::Error => self.error += 1,
            OutcomeStatus::Skipped => self.skipped += 1,
        }
    }

    /// Counter for a single status.
    pub fn get(&self, status: OutcomeStatus) -> usize {
        match status {
            OutcomeStatus::Pass => self.pass,
            OutcomeStatus::Fail => self.fail,
            OutcomeStatus::Error => self.error,
            OutcomeStatus::Skipped => self.skipped,
        }
    }

    /// Total number of outcomes counted.
    pub fn total(&self) -> usize {
        self.pass + self.fail + self.error + self.skipped
    }

    /// Overall status implied by these counts.
    pub fn status(&self) -> RunStatus {
        if self.fail > 0 {
            RunStatus::Fail
        } else if self.error > 0 {
            RunStatus::Error
        } else {
            RunStatus::Pass
        }
    }
}

/// Overall status of a run or a group of outcomes.
///
/// FAIL if anything failed, else ERROR if anything errored, else PASS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    /// No failures and no errors
    Pass,
    /// At least one failure
    Fail,
    /// At least one error and no failures
    Error,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Pass => "PASS",
            RunStatus::Fail => "FAIL",
            RunStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Immutable view of aggregated outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    /// Overall run status
    pub status: RunStatus,

    /// True when the run was cancelled before every check finished
    pub cancelled: bool,

    /// Counts over every outcome
    pub overall: StatusCounts,

    /// Counts per feed
    pub by_feed: BTreeMap<String, StatusCounts>,

    /// Counts per database
    pub by_database: BTreeMap<String, StatusCounts>,

    /// Counts per check kind
    pub by_kind: BTreeMap<CheckKind, StatusCounts>,

    /// Every outcome, sorted by target then kind
    pub outcomes: Vec<CheckOutcome>,

    /// When aggregation started
    pub started_at: DateTime<Utc>,

    /// When the snapshot was taken
    pub finished_at: DateTime<Utc>,
}

impl ValidationSummary {
    /// Returns true when the overall status is PASS.
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Pass
    }

    /// Outcomes of one kind.
    pub fn outcomes_of(&self, kind: CheckKind) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(move |o| o.kind == kind)
    }
}

#[derive(Debug)]
struct AggregatorState {
    overall: StatusCounts,
    by_feed: BTreeMap<String, StatusCounts>,
    by_database: BTreeMap<String, StatusCounts>,
    by_kind: BTreeMap<CheckKind, StatusCounts>,
    outcomes: Vec<CheckOutcome>,
    cancelled: bool,
}

/// Thread-safe collector of check outcomes.
///
/// Every [`record`](ResultAggregator::record) updates all counters under one
/// lock, so concurrent writers never observe or leave a partial update.
/// Counting is commutative: arrival order does not change the snapshot.
#[derive(Debug)]
pub struct ResultAggregator {
    state: Mutex<AggregatorState>,
    started_at: DateTime<Utc>,
}

impl ResultAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AggregatorState {
                overall: StatusCounts::default(),
                by_feed: BTreeMap::new(),
                by_database: BTreeMap::new(),
                by_kind: BTreeMap::new(),
                outcomes: Vec::new(),
                cancelled: false,
            }),
            started_at: Utc::now(),
        }
    }

    // Only counter updates and the final push run under the lock, none of which
    // panic, so a poisoned lock never guards a partial update and is ignored.
    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Appends one outcome.
    pub fn record(&self, outcome: CheckOutcome) {
        tracing::debug!(
            rule = %outcome.rule,
            kind = %outcome.kind,
            status = %outcome.status,
            "{}",
            outcome.message
        );
        let mut state = self.lock();
        let status = outcome.status;
        state.overall.record(status);
        state
            .by_feed
            .entry(outcome.rule.feed.clone())
            .or_default()
            .record(status);
        state
            .by_database
            .entry(outcome.rule.database.clone())
            .or_default()
            .record(status);
        state.by_kind.entry(outcome.kind).or_default().record(status);
        state.outcomes.push(outcome);
    }

    /// Flags the run as cancelled.
    pub fn mark_cancelled(&self) {
        self.lock().cancelled = true;
    }

    /// Number of outcomes recorded so far.
    pub fn len(&self) -> usize {
        self.lock().outcomes.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes an immutable snapshot of everything recorded so far.
    pub fn snapshot(&self) -> ValidationSummary {
        let state = self.lock();
        let mut outcomes = state.outcomes.clone();
        outcomes.sort_by(|a, b| {
            (&a.rule, a.kind, a.status, &a.message).cmp(&(&b.rule, b.kind, b.status, &b.message))
        });

        ValidationSummary {
            status: state.overall.status(),
            cancelled: state.cancelled,
            overall: state.overall,
            by_feed: state.by_feed.clone(),
            by_database: state.by_database.clone(),
            by_kind: state.by_kind.clone(),
            outcomes,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// A consumer of validation results (HTML, Excel, JSON, console, ...).
///
/// Sinks may receive outcomes one at a time while a run progresses and always
/// receive the finalized summary once.
pub trait ReportSink {
    /// Called for each outcome as it is produced. Default: ignore.
    fn record(&mut self, _outcome: &CheckOutcome) -> std::io::Result<()> {
        Ok(())
    }

    /// Called once with the finalized summary.
    fn finish(&mut self, summary: &ValidationSummary) -> std::io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RuleRef;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn outcome(feed: &str, db: &str, kind: CheckKind, status: OutcomeStatus) -> CheckOutcome {
        CheckOutcome::new(
            RuleRef {
                feed: feed.to_string(),
                module: feed.to_string(),
                database: db.to_string(),
                table: "T".to_string(),
                field: Some("F".to_string()),
            },
            kind,
            status,
            "",
        )
    }

    #[test]
    fn test_overall_status_precedence() {
        let aggregator = ResultAggregator::new();
        aggregator.record(outcome("A", "db", CheckKind::Range, OutcomeStatus::Error));
        assert_eq!(aggregator.snapshot().status, RunStatus::Error);

        aggregator.record(outcome("A", "db", CheckKind::Range, OutcomeStatus::Fail));
        assert_eq!(aggregator.snapshot().status, RunStatus::Fail);
    }

    #[test]
    fn test_skipped_only_is_pass() {
        let aggregator = ResultAggregator::new();
        aggregator.record(outcome("A", "db", CheckKind::RowCount, OutcomeStatus::Skipped));
        let summary = aggregator.snapshot();
        assert_eq!(summary.status, RunStatus::Pass);
        assert_eq!(summary.overall.skipped, 1);
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let statuses = [OutcomeStatus::Fail, OutcomeStatus::Pass, OutcomeStatus::Error];
        let permutations = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];

        for order in permutations {
            let aggregator = ResultAggregator::new();
            for i in order {
                aggregator.record(outcome("A", "db", CheckKind::Unique, statuses[i]));
            }
            let summary = aggregator.snapshot();
            assert_eq!(
                summary.overall,
                StatusCounts {
                    pass: 1,
                    fail: 1,
                    error: 1,
                    skipped: 0
                }
            );
            assert_eq!(summary.status, RunStatus::Fail);
        }
    }

    #[test]
    fn test_grouping_by_feed_database_and_kind() {
        let aggregator = ResultAggregator::new();
        aggregator.record(outcome("CUSTOMER_FEED", "server1", CheckKind::Range, OutcomeStatus::Pass));
        aggregator.record(outcome("CUSTOMER_FEED", "server1", CheckKind::Unique, OutcomeStatus::Fail));
        aggregator.record(outcome("TXN_FEED", "server2", CheckKind::Range, OutcomeStatus::Error));

        let summary = aggregator.snapshot();
        assert_eq!(summary.by_feed["CUSTOMER_FEED"].total(), 2);
        assert_eq!(summary.by_feed["TXN_FEED"].error, 1);
        assert_eq!(summary.by_database["server1"].fail, 1);
        assert_eq!(summary.by_kind[&CheckKind::Range].pass, 1);
        assert_eq!(summary.by_kind[&CheckKind::Range].error, 1);
        assert_eq!(summary.outcomes_of(CheckKind::Unique).count(), 1);
    }

    #[test]
    fn test_concurrent_recording_loses_nothing() {
        let aggregator = Arc::new(ResultAggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let aggregator = Arc::clone(&aggregator);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        let status = if (t + i) % 2 == 0 {
                            OutcomeStatus::Pass
                        } else {
                            OutcomeStatus::Fail
                        };
                        aggregator.record(outcome("A", "db", CheckKind::Range, status));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let summary = aggregator.snapshot();
        assert_eq!(summary.overall.total(), 2000);
        assert_eq!(summary.outcomes.len(), 2000);
        assert_eq!(summary.overall.pass, 1000);
        assert_eq!(summary.by_kind[&CheckKind::Range].total(), 2000);
    }

    #[test]
    fn test_poisoned_lock_keeps_recorded_outcomes() {
        let aggregator = Arc::new(ResultAggregator::new());
        aggregator.record(outcome("A", "db", CheckKind::Range, OutcomeStatus::Pass));

        let worker = Arc::clone(&aggregator);
        let joined = std::thread::spawn(move || {
            let _state = worker.lock();
            panic!("worker died holding the lock");
        })
        .join();
        assert!(joined.is_err());

        aggregator.record(outcome("A", "db", CheckKind::Unique, OutcomeStatus::Fail));
        let summary = aggregator.snapshot();
        assert_eq!(summary.overall.total(), 2);
        assert_eq!(summary.outcomes.len(), 2);
        assert_eq!(summary.status, RunStatus::Fail);
    }

    #[test]
    fn test_summary_serializes_with_field_names() {
        let aggregator = ResultAggregator::new();
        aggregator.record(outcome("A", "db", CheckKind::Range, OutcomeStatus::Pass));
        let json = serde_json::to_value(aggregator.snapshot()).unwrap();
        assert_eq!(json["status"], "PASS");
        assert_eq!(json["overall"]["pass"], 1);
        assert_eq!(json["by_kind"]["range"]["pass"], 1);
    }
}
