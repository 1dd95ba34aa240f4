//! Engine configuration.
//!
//! The configuration is an immutable value handed to the engine at start-up.
//! Nothing in the library reads environment variables or global state.

use crate::{EngineError, Threshold};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use validator::Validate;

/// Canonical type name to its accepted spellings.
///
/// Declared types in the workbook and types reported by a data source are
/// both mapped through this table before comparison. Lookup ignores case and
/// any parenthesised suffix, so `VARCHAR(50)` and `Decimal128(10, 2)` resolve
/// like `varchar` and `decimal128`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeAliases(BTreeMap<String, Vec<String>>);

/// Canonical types whose values are numbers.
const NUMERIC_TYPES: [&str; 2] = ["INTEGER", "DECIMAL"];

fn strip_type(raw: &str) -> String {
    let head = raw.split('(').next().unwrap_or(raw);
    head.trim().to_ascii_lowercase()
}

impl TypeAliases {
    /// Creates an alias table from `(canonical, aliases)` pairs.
    pub fn new<I, S, A>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, A)>,
        S: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(canonical, aliases)| {
                    (
                        canonical.into().to_ascii_uppercase(),
                        aliases.into_iter().map(Into::into).collect(),
                    )
                })
                .collect(),
        )
    }

    /// Maps a type spelling to its canonical name.
    ///
    /// Unknown spellings are returned upper-cased with the suffix removed.
    pub fn canonicalize(&self, raw: &str) -> String {
        let stripped = strip_type(raw);
        for (canonical, aliases) in &self.0 {
            if canonical.eq_ignore_ascii_case(&stripped)
                || aliases.iter().any(|a| strip_type(a) == stripped)
            {
                return canonical.clone();
            }
        }
        stripped.to_ascii_uppercase()
    }

    /// Whether two spellings denote the same canonical type.
    pub fn matches(&self, declared: &str, observed: &str) -> bool {
        self.canonicalize(declared) == self.canonicalize(observed)
    }

    /// Whether a declared type is numeric-like.
    pub fn is_numeric(&self, declared: &str) -> bool {
        let canonical = self.canonicalize(declared);
        NUMERIC_TYPES.contains(&canonical.as_str())
    }

    /// Number of canonical types.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for TypeAliases {
    fn default() -> Self {
        Self::new([
            (
                "VARCHAR",
                vec![
                    "VARCHAR", "NVARCHAR", "CHAR", "TEXT", "STRING", "Utf8", "LargeUtf8",
                    "Utf8View",
                ],
            ),
            (
                "INTEGER",
                vec![
                    "INTEGER", "INT", "BIGINT", "SMALLINT", "TINYINT", "Int8", "Int16", "Int32",
                    "Int64", "UInt8", "UInt16", "UInt32", "UInt64",
                ],
            ),
            (
                "DECIMAL",
                vec![
                    "DECIMAL", "NUMERIC", "FLOAT", "REAL", "DOUBLE", "Float16", "Float32",
                    "Float64", "Decimal128", "Decimal256",
                ],
            ),
            (
                "DATETIME",
                vec![
                    "DATETIME", "TIMESTAMP", "DATE", "TIME", "Date32", "Date64", "Time32",
                    "Time64",
                ],
            ),
            ("BOOLEAN", vec!["BOOLEAN", "BOOL", "BIT"]),
        ])
    }
}

fn default_max_workers() -> usize {
    4
}

fn default_query_timeout_ms() -> u64 {
    300_000
}

fn default_sample_size() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_completeness_ratio() -> f64 {
    0.95
}

/// Immutable configuration passed into the engine entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Upper bound on concurrently running checks
    #[serde(default = "default_max_workers")]
    #[validate(range(min = 1, max = 256))]
    pub max_workers: usize,

    /// Timeout applied to every data-access call, in milliseconds
    #[serde(default = "default_query_timeout_ms")]
    #[validate(range(min = 1))]
    pub query_timeout_ms: u64,

    /// Maximum number of offending values quoted in outcome messages
    #[serde(default = "default_sample_size")]
    #[validate(range(min = 1, max = 1000))]
    pub sample_size: usize,

    /// Whether enumeration membership compares case-sensitively
    #[serde(default = "default_true")]
    pub enumeration_case_sensitive: bool,

    /// Type alias table used by the data type check and the normalizer
    #[serde(default)]
    pub type_aliases: TypeAliases,

    /// Companion thresholds keyed by `DB.TABLE`
    #[serde(default)]
    pub thresholds: BTreeMap<String, Threshold>,

    /// Completeness ratio applied when neither the row nor the threshold table sets one
    #[serde(default = "default_completeness_ratio")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub default_completeness_ratio: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            query_timeout_ms: default_query_timeout_ms(),
            sample_size: default_sample_size(),
            enumeration_case_sensitive: true,
            type_aliases: TypeAliases::default(),
            thresholds: BTreeMap::new(),
            default_completeness_ratio: default_completeness_ratio(),
        }
    }
}

impl EngineConfig {
    /// Validates every range constraint and the threshold table.
    pub fn check(&self) -> Result<(), EngineError> {
        self.validate()
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;

        for (key, threshold) in &self.thresholds {
            match threshold.completeness_ratio {
                Some(ratio) if !(0.0..=1.0).contains(&ratio) => {
                    return Err(EngineError::InvalidConfig(format!(
                        "completeness_ratio for '{key}' must be between 0 and 1, got {ratio}"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Per-call timeout.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Completeness ratio for a table: row value, then threshold table, then default.
    pub fn completeness_ratio(&self, own: Threshold, database: &str, table: &str) -> f64 {
        own.or(self.threshold_for(database, table))
            .completeness_ratio
            .unwrap_or(self.default_completeness_ratio)
    }

    /// Companion threshold for a table, matched case-insensitively on `DB.TABLE`.
    pub fn threshold_for(&self, database: &str, table: &str) -> Threshold {
        let key = format!("{database}.{table}");
        self.thresholds
            .get(&key)
            .or_else(|| {
                self.thresholds
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(&key))
                    .map(|(_, t)| t)
            })
            .copied()
            .unwrap_or_default()
    }

    /// Builder-style setter for the worker count.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Builder-style setter for the per-call timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Builder-style setter for a companion threshold.
    pub fn with_threshold(mut self, database: &str, table: &str, threshold: Threshold) -> Self {
        self.thresholds
            .insert(format!("{database}.{table}"), threshold);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.query_timeout(), Duration::from_secs(300));
        assert!(config.enumeration_case_sensitive);
        assert_eq!(config.default_completeness_ratio, 0.95);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = EngineConfig::default().with_max_workers(0);
        assert!(matches!(config.check(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let config = EngineConfig::default().with_threshold(
            "server1",
            "CUSTOMER_STG",
            Threshold {
                expected_count: None,
                completeness_ratio: Some(1.5),
            },
        );
        assert!(config.check().is_err());
    }

    #[test]
    fn test_type_canonicalization() {
        let aliases = TypeAliases::default();
        assert_eq!(aliases.canonicalize("varchar(50)"), "VARCHAR");
        assert_eq!(aliases.canonicalize("Int64"), "INTEGER");
        assert_eq!(aliases.canonicalize("Decimal128(10, 2)"), "DECIMAL");
        assert_eq!(aliases.canonicalize("Timestamp(Nanosecond, None)"), "DATETIME");
        assert_eq!(aliases.canonicalize("geometry"), "GEOMETRY");
        assert!(aliases.matches("STRING", "Utf8"));
        assert!(!aliases.matches("INTEGER", "Utf8"));
    }

    #[test]
    fn test_numeric_types() {
        let aliases = TypeAliases::default();
        assert!(aliases.is_numeric("INTEGER"));
        assert!(aliases.is_numeric("numeric(12,2)"));
        assert!(!aliases.is_numeric("VARCHAR"));
        assert!(!aliases.is_numeric(""));
    }

    #[test]
    fn test_threshold_lookup_ignores_case() {
        let config = EngineConfig::default().with_threshold(
            "SERVER1",
            "CUSTOMER_STG",
            Threshold {
                expected_count: Some(100),
                completeness_ratio: None,
            },
        );
        assert_eq!(
            config.threshold_for("server1", "customer_stg").expected_count,
            Some(100)
        );
        assert_eq!(config.threshold_for("server2", "x"), Threshold::default());
    }

    #[test]
    fn test_deserialize_partial_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            max_workers = 8

            [thresholds."server1.CUSTOMER_STG"]
            expected_count = 500
            completeness_ratio = 0.95
            "#,
        )
        .unwrap();
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.sample_size, 10);
        assert_eq!(
            config.threshold_for("server1", "CUSTOMER_STG").completeness_ratio,
            Some(0.95)
        );
    }
}
