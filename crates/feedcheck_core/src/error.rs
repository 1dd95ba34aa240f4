//! Error types for metadata-driven validation.
//!
//! Errors here are scoped: a [`MetadataFormatError`] rejects one metadata row,
//! a [`RuleResolutionError`] marks one rule, and only [`EngineError`] is fatal
//! to a whole run.

use crate::RuleRef;
use thiserror::Error;

/// Result type for engine-level operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// A single metadata row could not be turned into a rule.
///
/// The row is rejected on its own; the rest of the load continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed row {row} in sheet '{sheet}': {message}")]
pub struct MetadataFormatError {
    /// Sheet the row was read from
    pub sheet: String,
    /// Zero-based row index inside the sheet
    pub row: usize,
    /// What was wrong with the row
    pub message: String,
}

impl MetadataFormatError {
    /// Creates a new format error for a row.
    pub fn new(sheet: impl Into<String>, row: usize, message: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            row,
            message: message.into(),
        }
    }

    /// Creates an error for a required identifying column that is blank.
    pub fn missing_column(sheet: impl Into<String>, row: usize, column: &str) -> Self {
        Self::new(sheet, row, format!("required column '{column}' is empty"))
    }
}

/// A rule references an enumeration that is not defined in the workbook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Rule {rule} references unknown enumeration '{enumeration}'")]
pub struct RuleResolutionError {
    /// The rule holding the dangling reference
    pub rule: RuleRef,
    /// Name of the enumeration that could not be resolved
    pub enumeration: String,
}

/// Fatal errors that abort a run before any check is executed.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The metadata source produced no rows at all
    #[error("No metadata rows could be read from the workbook")]
    NoMetadataRows,

    /// Every row was rejected during normalization
    #[error("No resolvable validation rules: {rejected} row(s) rejected")]
    NoResolvableRules {
        /// Number of rejected rows
        rejected: usize,
    },

    /// Engine configuration is out of range
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),
}
