//! Check kinds and per-check outcomes.

use crate::RuleRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of check that produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Declared vs. observed column type
    DataType,
    /// Null handling for mandatory / non-nullable fields
    Mandatory,
    /// Distinct values
    Unique,
    /// Inclusive numeric bounds
    Range,
    /// Membership in a named enumeration
    Enumeration,
    /// Insert / Append load behaviour against a watermark
    RequestMode,
    /// Observed vs. expected row count
    RowCount,
    /// Average non-null ratio of a table's declared columns
    Completeness,
    /// Feed file present in the landing directory
    FeedFile,
    /// Job log file written by the scheduler
    LogFile,
    /// Scheduler job status
    JobStatus,
}

/// Granularity at which a kind is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckScope {
    /// Once per rule (column)
    Column,
    /// Once per database + table + feed target
    Table,
    /// Not driven by rules (files, jobs)
    External,
}

impl CheckKind {
    /// Every kind, in report order.
    pub const ALL: [CheckKind; 11] = [
        CheckKind::DataType,
        CheckKind::Mandatory,
        CheckKind::Unique,
        CheckKind::Range,
        CheckKind::Enumeration,
        CheckKind::RequestMode,
        CheckKind::RowCount,
        CheckKind::Completeness,
        CheckKind::FeedFile,
        CheckKind::LogFile,
        CheckKind::JobStatus,
    ];

    /// Stable identifier used in reports and selectors.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::DataType => "data_type",
            CheckKind::Mandatory => "mandatory",
            CheckKind::Unique => "unique",
            CheckKind::Range => "range",
            CheckKind::Enumeration => "enumeration",
            CheckKind::RequestMode => "request_mode",
            CheckKind::RowCount => "row_count",
            CheckKind::Completeness => "completeness",
            CheckKind::FeedFile => "feed_file",
            CheckKind::LogFile => "log_file",
            CheckKind::JobStatus => "job_status",
        }
    }

    /// Granularity of this kind.
    pub fn scope(&self) -> CheckScope {
        match self {
            CheckKind::RequestMode | CheckKind::RowCount | CheckKind::Completeness => {
                CheckScope::Table
            }
            CheckKind::FeedFile | CheckKind::LogFile | CheckKind::JobStatus => {
                CheckScope::External
            }
            _ => CheckScope::Column,
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "data_type" | "datatype" | "type" => Ok(CheckKind::DataType),
            "mandatory" | "nullable" | "null" => Ok(CheckKind::Mandatory),
            "unique" | "uniqueness" => Ok(CheckKind::Unique),
            "range" => Ok(CheckKind::Range),
            "enumeration" | "enum" => Ok(CheckKind::Enumeration),
            "request_mode" | "insert_append" | "request" => Ok(CheckKind::RequestMode),
            "row_count" | "count" => Ok(CheckKind::RowCount),
            "completeness" => Ok(CheckKind::Completeness),
            "feed_file" | "file" => Ok(CheckKind::FeedFile),
            "log_file" | "log" => Ok(CheckKind::LogFile),
            "job_status" | "job" => Ok(CheckKind::JobStatus),
            other => Err(format!("unknown validation kind '{other}'")),
        }
    }
}

/// Result of one check.
///
/// `Fail` means the data is wrong, `Error` means the check could not be
/// performed, `Skipped` means it did not apply. These are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutcomeStatus {
    /// Condition satisfied
    Pass,
    /// Condition violated
    Fail,
    /// Could not evaluate
    Error,
    /// Not applicable
    Skipped,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Pass => "PASS",
            OutcomeStatus::Fail => "FAIL",
            OutcomeStatus::Error => "ERROR",
            OutcomeStatus::Skipped => "SKIPPED",
        };
        f.write_str(s)
    }
}

/// The outcome of exactly one checker invocation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Rule (or target) the check ran against
    pub rule: RuleRef,

    /// Kind of check
    pub kind: CheckKind,

    /// Result
    pub status: OutcomeStatus,

    /// Observed values backing the verdict (counts, offending samples, types)
    pub observed: Vec<String>,

    /// Human-readable explanation
    pub message: String,

    /// When the outcome was produced
    pub timestamp: DateTime<Utc>,
}

impl CheckOutcome {
    /// Creates an outcome with the current timestamp.
    pub fn new(
        rule: RuleRef,
        kind: CheckKind,
        status: OutcomeStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule,
            kind,
            status,
            observed: Vec::new(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a passing outcome.
    pub fn pass(rule: RuleRef, kind: CheckKind, message: impl Into<String>) -> Self {
        Self::new(rule, kind, OutcomeStatus::Pass, message)
    }

    /// Creates a failing outcome.
    pub fn fail(rule: RuleRef, kind: CheckKind, message: impl Into<String>) -> Self {
        Self::new(rule, kind, OutcomeStatus::Fail, message)
    }

    /// Creates an error outcome.
    pub fn error(rule: RuleRef, kind: CheckKind, message: impl Into<String>) -> Self {
        Self::new(rule, kind, OutcomeStatus::Error, message)
    }

    /// Creates a skipped outcome.
    pub fn skipped(rule: RuleRef, kind: CheckKind, message: impl Into<String>) -> Self {
        Self::new(rule, kind, OutcomeStatus::Skipped, message)
    }

    /// Attaches observed values.
    pub fn with_observed<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.observed = values.into_iter().map(Into::into).collect();
        self
    }
}
