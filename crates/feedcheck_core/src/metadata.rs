//! Raw metadata rows as read from the workbook.
//!
//! A [`MetadataRow`] is deliberately untyped: every cell is a string or blank.
//! Turning rows into [`ValidationRule`](crate::ValidationRule)s happens once, at
//! the normalization boundary in `feedcheck_parser`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sheet holding feed to staging column rules.
pub const FEED_TO_STAGING: &str = "Feed_to_staging";
/// Sheet holding staging to target column rules.
pub const STAGING_TO_GRI: &str = "Staging_to_GRI";
/// Sheet holding named enumeration values.
pub const ENUMERATION: &str = "Enumeration";
/// Sheet holding pattern rules (read, not evaluated).
pub const PATTERNS: &str = "Patterns";
/// Sheet holding reconciliation rules (read, not evaluated).
pub const RECONCILIATIONS: &str = "Reconciliations";
/// Sheet holding free-form business rules (read, not evaluated).
pub const BUSINESS_RULES: &str = "Business Rules";

/// All sheet names the engine knows about.
pub const KNOWN_SHEETS: [&str; 6] = [
    FEED_TO_STAGING,
    STAGING_TO_GRI,
    ENUMERATION,
    PATTERNS,
    RECONCILIATIONS,
    BUSINESS_RULES,
];

/// One spreadsheet line: column name to cell text.
///
/// Column names are trimmed on insertion. Blank cells are not stored, so
/// [`MetadataRow::get`] never returns an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    index: usize,
    cells: BTreeMap<String, String>,
}

impl MetadataRow {
    /// Creates an empty row at the given position in its sheet.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            cells: BTreeMap::new(),
        }
    }

    /// Builds a row from `(column, value)` pairs.
    pub fn from_pairs<K, V, I>(index: usize, pairs: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut row = Self::new(index);
        for (column, value) in pairs {
            row.insert(column.as_ref(), value.as_ref());
        }
        row
    }

    /// Sets a cell. Blank values are dropped.
    pub fn insert(&mut self, column: &str, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            self.cells.remove(column.trim());
        } else {
            self.cells.insert(column.trim().to_string(), value.to_string());
        }
    }

    /// Position of this row inside its sheet.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the trimmed, non-blank value of a column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    /// Returns the first non-blank value among several spellings of a column.
    ///
    /// Workbooks in the wild carry headers like `Trg _DB Table` next to
    /// `Trg_DB Table`; callers list every accepted spelling.
    pub fn first_of(&self, columns: &[&str]) -> Option<&str> {
        columns.iter().find_map(|c| self.get(c))
    }

    /// Iterates over the non-blank cells.
    pub fn cells(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Anything that can hand out metadata rows by sheet name.
pub trait MetadataSource {
    /// Rows of the named sheet, or `None` when the sheet does not exist.
    fn sheet(&self, name: &str) -> Option<&[MetadataRow]>;

    /// Total number of rows across the known sheets.
    fn total_rows(&self) -> usize {
        KNOWN_SHEETS
            .iter()
            .filter_map(|name| self.sheet(name))
            .map(<[MetadataRow]>::len)
            .sum()
    }
}
