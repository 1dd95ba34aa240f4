//! In-memory workbook: sheet name to rows.
//!
//! Workbooks are exported from the metadata spreadsheet as YAML, TOML or
//! JSON documents whose top-level keys are sheet names and whose values are
//! lists of rows:
//!
//! ```yaml
//! Feed_to_staging:
//!   - Modules: CUSTOMER_MODULE
//!     Feed: CUSTOMER_FEED
//!     FieldName: AGE
//!     RangeBottom: 0
//!     RangeTop: 120
//! Enumeration:
//!   - EnumerationName: STATUS_ENUM
//!     EnumValues: ACTIVE
//! ```

use feedcheck_core::{MetadataRow, MetadataSource};
use serde::Deserialize;
use std::collections::BTreeMap;

/// A raw spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum Cell {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    fn into_text(self) -> String {
        match self {
            Cell::Bool(true) => "Y".to_string(),
            Cell::Bool(false) => "N".to_string(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Text(s) => s,
        }
    }
}

pub(crate) type RawSheet = Vec<BTreeMap<String, Option<Cell>>>;
pub(crate) type RawWorkbook = BTreeMap<String, RawSheet>;

/// Metadata workbook loaded from disk or a string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: BTreeMap<String, Vec<MetadataRow>>,
}

impl Workbook {
    /// Creates an empty workbook.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_raw(raw: RawWorkbook) -> Self {
        let sheets = raw
            .into_iter()
            .map(|(name, rows)| {
                let rows = rows
                    .into_iter()
                    .enumerate()
                    .map(|(index, cells)| {
                        let mut row = MetadataRow::new(index);
                        for (column, cell) in cells {
                            if let Some(cell) = cell {
                                row.insert(&column, &cell.into_text());
                            }
                        }
                        row
                    })
                    .collect();
                (name.trim().to_string(), rows)
            })
            .collect();
        Self { sheets }
    }

    /// Adds or replaces a sheet.
    pub fn insert_sheet(&mut self, name: impl Into<String>, rows: Vec<MetadataRow>) {
        self.sheets.insert(name.into(), rows);
    }

    /// Names of every sheet in the workbook.
    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }
}

impl MetadataSource for Workbook {
    fn sheet(&self, name: &str) -> Option<&[MetadataRow]> {
        self.sheets
            .get(name)
            .or_else(|| {
                self.sheets
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, rows)| rows)
            })
            .map(Vec::as_slice)
    }
}
