//! Data-access collaborator contract.
//!
//! Checkers never talk to storage directly. They describe what they need as a
//! [`QuerySpec`] and a [`DataSource`] answers it, so the engine stays agnostic
//! to the concrete storage technology.

use crate::{DataAccessError, DataValue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feedcheck_core::TableTarget;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A single read against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySpec {
    /// Declared type of a column; `None` in the result when the column is missing
    ColumnType { column: String },

    /// Every value of a column, nulls included
    ColumnValues {
        column: String,
        filter: Option<String>,
    },

    /// Number of rows
    RowCount { filter: Option<String> },

    /// Number of null values in a column
    NullCount {
        column: String,
        filter: Option<String>,
    },
}

impl QuerySpec {
    /// Row filter carried by the query, if any.
    pub fn filter(&self) -> Option<&str> {
        match self {
            QuerySpec::ColumnType { .. } => None,
            QuerySpec::ColumnValues { filter, .. }
            | QuerySpec::RowCount { filter }
            | QuerySpec::NullCount { filter, .. } => filter.as_deref(),
        }
    }

    /// Column targeted by the query, if any.
    pub fn column(&self) -> Option<&str> {
        match self {
            QuerySpec::ColumnType { column }
            | QuerySpec::ColumnValues { column, .. }
            | QuerySpec::NullCount { column, .. } => Some(column),
            QuerySpec::RowCount { .. } => None,
        }
    }
}

/// Answer to a [`QuerySpec`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Column type as reported by the source
    ColumnType(Option<String>),
    /// Column values
    Values(Vec<DataValue>),
    /// A count
    Count(u64),
}

/// Reference point recorded after a run, used by Insert/Append checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    /// Row count of the table when the watermark was taken
    pub row_count: u64,
    /// When the watermark was taken
    pub recorded_at: DateTime<Utc>,
}

impl Watermark {
    /// Creates a watermark stamped with the current time.
    pub fn now(row_count: u64) -> Self {
        Self {
            row_count,
            recorded_at: Utc::now(),
        }
    }
}

/// Anything that can answer queries about database tables.
///
/// Implementations must be safe to call from many workers at once. Retries,
/// if any, are the implementation's business; the engine never retries.
#[async_trait]
pub trait DataSource: Debug + Send + Sync {
    /// Runs one query against `database.table`.
    async fn execute(
        &self,
        database: &str,
        table: &str,
        query: &QuerySpec,
    ) -> Result<QueryResult, DataAccessError>;

    /// Watermark recorded for a table target by a previous run, if any.
    ///
    /// The default has no watermark storage.
    async fn watermark(&self, _target: &TableTarget) -> Result<Option<Watermark>, DataAccessError> {
        Ok(None)
    }

    /// Returns a human-readable description of this data source.
    fn description(&self) -> String;
}
