//! Error types for data access.

use std::time::Duration;
use thiserror::Error;

/// A collaborator (database, file system, scheduler) could not answer.
///
/// Any of these turns the affected check into an ERROR outcome; they never
/// abort sibling checks.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataAccessError {
    /// The query itself failed
    #[error("Query against '{table}' failed: {message}")]
    Query { table: String, message: String },

    /// The call did not answer within the configured timeout
    #[error("Data access timed out after {0:?}")]
    Timeout(Duration),

    /// The table is not known to the data source
    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    /// The column is not present in the table
    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// The data source cannot run this kind of query
    #[error("Unsupported query: {0}")]
    Unsupported(String),

    /// File system failure
    #[error("I/O error: {0}")]
    Io(String),

    /// The watermark store failed
    #[error("Watermark store error: {0}")]
    Watermark(String),

    /// The job scheduler could not be queried
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl DataAccessError {
    /// Creates a new query error.
    pub fn query(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates a new unknown column error.
    pub fn unknown_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Creates a new unsupported query error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Creates a new watermark error.
    pub fn watermark(message: impl Into<String>) -> Self {
        Self::Watermark(message.into())
    }
}

impl From<std::io::Error> for DataAccessError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
