//! Metadata workbook loading and rule normalization.
//!
//! The metadata spreadsheet is exported as YAML, TOML or JSON: a mapping
//! from sheet name to a list of rows. This crate reads such exports into a
//! [`Workbook`] and normalizes its rule sheets into a
//! [`RuleCatalog`](feedcheck_core::RuleCatalog).
//!
//! # Example
//!
//! ```rust
//! use feedcheck_core::{EngineConfig, MetadataSource};
//! use feedcheck_parser::{load_catalog, parse_yaml};
//!
//! let yaml = r#"
//! Feed_to_staging:
//!   - Modules: CUSTOMER_MODULE
//!     Feed: CUSTOMER_FEED
//!     FieldName: AGE
//!     DBName: server1
//!     DB Table: CUSTOMER_STG
//!     DataType: INTEGER
//!     Mandatory: Y
//!     RangeBottom: 0
//!     RangeTop: 120
//! "#;
//!
//! let workbook = parse_yaml(yaml).expect("Failed to parse workbook");
//! assert_eq!(workbook.total_rows(), 1);
//!
//! let loaded = load_catalog(&workbook, &EngineConfig::default()).unwrap();
//! assert_eq!(loaded.catalog.rules()[0].range(), Some((0.0, 120.0)));
//! ```

pub mod normalize;
pub mod workbook;

pub use normalize::*;
pub use workbook::Workbook;

use std::path::Path;
use thiserror::Error;
use workbook::RawWorkbook;

/// Errors that can occur while reading a workbook.
#[derive(Debug, Error)]
pub enum ParserError {
    /// YAML parsing or deserialization failed
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml_ng::Error),

    /// TOML parsing or deserialization failed
    #[error("Failed to parse TOML: {0}")]
    TomlError(String),

    /// JSON parsing or deserialization failed
    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    /// File I/O error
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Unsupported file format
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Invalid file extension
    #[error("Invalid or missing file extension")]
    InvalidExtension,
}

/// Result type alias for parser operations.
pub type Result<T> = std::result::Result<T, ParserError>;

/// Supported workbook export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookFormat {
    /// YAML format (.yml, .yaml)
    Yaml,
    /// TOML format (.toml)
    Toml,
    /// JSON format (.json)
    Json,
}

/// Parse a workbook from a YAML string.
pub fn parse_yaml(content: &str) -> Result<Workbook> {
    let raw: RawWorkbook = serde_yaml_ng::from_str(content)?;
    Ok(Workbook::from_raw(raw))
}

/// Parse a workbook from a TOML string.
///
/// Each sheet is an array of tables:
///
/// ```rust
/// use feedcheck_core::MetadataSource;
/// use feedcheck_parser::parse_toml;
///
/// let toml = r#"
/// [[Enumeration]]
/// EnumerationName = "STATUS_ENUM"
/// EnumValues = "ACTIVE"
///
/// [[Enumeration]]
/// EnumerationName = "STATUS_ENUM"
/// EnumValues = "INACTIVE"
/// "#;
///
/// let workbook = parse_toml(toml).unwrap();
/// assert_eq!(workbook.sheet("Enumeration").map(|rows| rows.len()), Some(2));
/// ```
pub fn parse_toml(content: &str) -> Result<Workbook> {
    let raw: RawWorkbook =
        toml::from_str(content).map_err(|e| ParserError::TomlError(e.to_string()))?;
    Ok(Workbook::from_raw(raw))
}

/// Parse a workbook from a JSON string.
pub fn parse_json(content: &str) -> Result<Workbook> {
    let raw: RawWorkbook = serde_json::from_str(content)?;
    Ok(Workbook::from_raw(raw))
}

/// Detect the workbook format from a file path based on its extension.
///
/// # Errors
///
/// Returns `ParserError::InvalidExtension` if the file has no extension.
/// Returns `ParserError::UnsupportedFormat` if the extension is not recognized.
pub fn detect_format(path: &Path) -> Result<WorkbookFormat> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or(ParserError::InvalidExtension)?;

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(WorkbookFormat::Yaml),
        "toml" => Ok(WorkbookFormat::Toml),
        "json" => Ok(WorkbookFormat::Json),
        other => Err(ParserError::UnsupportedFormat(other.to_string())),
    }
}

/// Parse a workbook from a file with automatic format detection.
///
/// ```no_run
/// use feedcheck_parser::parse_file;
/// use std::path::Path;
///
/// let workbook = parse_file(Path::new("metadata/validation_metadata.yml")).unwrap();
/// for sheet in workbook.sheet_names() {
///     println!("{sheet}");
/// }
/// ```
pub fn parse_file(path: &Path) -> Result<Workbook> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        WorkbookFormat::Yaml => parse_yaml(&content),
        WorkbookFormat::Toml => parse_toml(&content),
        WorkbookFormat::Json => parse_json(&content),
    }
}
