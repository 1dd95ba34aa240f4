//! Normalized validation rules.
//!
//! This module contains the typed form of a metadata row. Everything
//! downstream of the normalizer works on these types only.

use crate::CheckKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Which sheet a rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOrigin {
    /// `Feed_to_staging` sheet
    FeedToStaging,
    /// `Staging_to_GRI` sheet
    StagingToTarget,
}

/// Load behaviour declared for the target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    /// New rows are inserted on every run
    Insert,
    /// Incremental load: rows are only ever added, never removed
    Append,
}

impl RequestMode {
    /// Parses a metadata cell, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "insert" => Some(RequestMode::Insert),
            "append" => Some(RequestMode::Append),
            _ => None,
        }
    }
}

impl fmt::Display for RequestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMode::Insert => f.write_str("Insert"),
            RequestMode::Append => f.write_str("Append"),
        }
    }
}

/// Row-count and completeness thresholds for a rule.
///
/// Either value may come from the metadata row itself or from the
/// companion threshold table in [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Expected number of rows in the target table
    pub expected_count: Option<u64>,

    /// Minimum average non-null ratio of the table's columns (0.0 to 1.0)
    pub completeness_ratio: Option<f64>,
}

impl Threshold {
    /// Fills unset values from `fallback`.
    pub fn or(self, fallback: Threshold) -> Threshold {
        Threshold {
            expected_count: self.expected_count.or(fallback.expected_count),
            completeness_ratio: self.completeness_ratio.or(fallback.completeness_ratio),
        }
    }
}

/// Stable reference to the metadata row a rule was built from.
///
/// Outcomes carry this instead of the rule itself so that reports can be
/// produced after the catalog is gone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleRef {
    /// Feed name (module name for staging rules)
    pub feed: String,
    /// Module the rule belongs to
    pub module: String,
    /// Database holding the table
    pub database: String,
    /// Table being validated
    pub table: String,
    /// Column being validated; `None` for table-level checks
    pub field: Option<String>,
}

impl RuleRef {
    /// Returns a copy of this reference without the field name.
    pub fn table_level(&self) -> RuleRef {
        RuleRef {
            field: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for RuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)?;
        if let Some(field) = &self.field {
            write!(f, ".{field}")?;
        }
        write!(f, " [{}]", self.feed)
    }
}

/// A validation rule normalized from one metadata row.
///
/// Rules are created once at load time and never mutated. `field_name`,
/// `database_name` and `table_name` are always non-empty, and when both range
/// bounds are present `range_bottom <= range_top`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    /// Sheet the rule was read from
    pub origin: RuleOrigin,

    /// Row index inside that sheet
    pub row: usize,

    /// Feed this rule belongs to
    pub feed: String,

    /// Feed files named by the feed cell (`a.csv, b.csv|c.csv`)
    #[serde(default)]
    pub feed_files: Vec<String>,

    /// Module this rule belongs to
    pub module: String,

    /// Column under test
    pub field_name: String,

    /// Database holding the table
    pub database_name: String,

    /// Table holding the column
    pub table_name: String,

    /// Declared data type as written in the workbook (may be empty)
    pub data_type: String,

    /// Whether nulls are allowed
    pub nullable: bool,

    /// Whether a value is required; overrides `nullable`
    pub mandatory: bool,

    /// Whether values must be distinct
    pub unique: bool,

    /// Declared load behaviour for the target table
    pub request_mode: Option<RequestMode>,

    /// Default value declared for the column
    pub default_value: Option<String>,

    /// Resolved enumeration name
    pub enumeration_name: Option<String>,

    /// Enumeration referenced by the row that could not be resolved
    pub unresolved_enumeration: Option<String>,

    /// Inclusive lower bound
    pub range_bottom: Option<f64>,

    /// Inclusive upper bound
    pub range_top: Option<f64>,

    /// True when the row declared a range, even if it could not be parsed
    pub range_declared: bool,

    /// Row filter applied to every query for this rule
    pub where_clause: Option<String>,

    /// Thresholds declared on the row
    pub threshold: Threshold,
}

impl ValidationRule {
    /// Returns the reference used in outcomes for this rule.
    pub fn reference(&self) -> RuleRef {
        RuleRef {
            feed: self.feed.clone(),
            module: self.module.clone(),
            database: self.database_name.clone(),
            table: self.table_name.clone(),
            field: Some(self.field_name.clone()),
        }
    }

    /// Nulls are rejected when the field is mandatory or not nullable.
    ///
    /// Mandatory always wins over `nullable = true`.
    pub fn rejects_nulls(&self) -> bool {
        self.mandatory || !self.nullable
    }

    /// Returns both range bounds when the rule has a complete range.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.range_bottom.zip(self.range_top)
    }

    /// Whether the row declares anything a check of `kind` could evaluate.
    ///
    /// Row count and completeness apply to every table, so they are always
    /// declared.
    pub fn declares(&self, kind: CheckKind) -> bool {
        match kind {
            CheckKind::DataType => !self.data_type.is_empty(),
            CheckKind::Mandatory => self.rejects_nulls(),
            CheckKind::RowCount | CheckKind::Completeness => true,
            CheckKind::Unique => self.unique,
            CheckKind::Range => self.range_declared,
            CheckKind::Enumeration => {
                self.enumeration_name.is_some() || self.unresolved_enumeration.is_some()
            }
            CheckKind::RequestMode => self.request_mode.is_some(),
            CheckKind::FeedFile | CheckKind::LogFile | CheckKind::JobStatus => false,
        }
    }
}

/// A named closed set of allowed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationSet {
    /// Enumeration name as referenced by rules
    pub name: String,

    /// Allowed values
    pub allowed_values: BTreeSet<String>,
}

impl EnumerationSet {
    /// Creates an enumeration from its values.
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            allowed_values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Membership test.
    pub fn contains(&self, value: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            self.allowed_values.contains(value)
        } else {
            self.allowed_values
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(value))
        }
    }
}

/// All enumerations of a workbook, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationCatalog {
    sets: BTreeMap<String, EnumerationSet>,
}

impl EnumerationCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value to the named enumeration, creating it if needed.
    pub fn add_value(&mut self, name: &str, value: &str) {
        self.sets
            .entry(name.to_string())
            .or_insert_with(|| EnumerationSet::new(name, Vec::<String>::new()))
            .allowed_values
            .insert(value.to_string());
    }

    /// Inserts a whole set, replacing any set with the same name.
    pub fn insert(&mut self, set: EnumerationSet) {
        self.sets.insert(set.name.clone(), set);
    }

    /// Looks up an enumeration by name.
    pub fn get(&self, name: &str) -> Option<&EnumerationSet> {
        self.sets.get(name)
    }

    /// Number of enumerations.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Returns true if no enumeration is defined.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Iterates over the enumerations in name order.
    pub fn iter(&self) -> impl Iterator<Item = &EnumerationSet> {
        self.sets.values()
    }
}

impl FromIterator<EnumerationSet> for EnumerationCatalog {
    fn from_iter<T: IntoIterator<Item = EnumerationSet>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for set in iter {
            catalog.insert(set);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RuleBuilder;

    #[test]
    fn test_request_mode_parse() {
        assert_eq!(RequestMode::parse(" insert "), Some(RequestMode::Insert));
        assert_eq!(RequestMode::parse("APPEND"), Some(RequestMode::Append));
        assert_eq!(RequestMode::parse("upsert"), None);
    }

    #[test]
    fn test_mandatory_overrides_nullable() {
        let rule = RuleBuilder::new("CUSTOMER_FEED", "db", "t", "age")
            .nullable(true)
            .mandatory(true)
            .build();
        assert!(rule.rejects_nulls());

        let rule = RuleBuilder::new("CUSTOMER_FEED", "db", "t", "age")
            .nullable(true)
            .build();
        assert!(!rule.rejects_nulls());
    }

    #[test]
    fn test_declared_kinds() {
        let rule = RuleBuilder::new("CUSTOMER_FEED", "db", "t", "status")
            .data_type("VARCHAR")
            .enumeration("STATUS_ENUM")
            .build();
        assert!(rule.declares(CheckKind::DataType));
        assert!(rule.declares(CheckKind::Enumeration));
        assert!(rule.declares(CheckKind::Mandatory));
        assert!(rule.declares(CheckKind::Completeness));
        assert!(!rule.declares(CheckKind::Range));
        assert!(!rule.declares(CheckKind::Unique));
        assert!(!rule.declares(CheckKind::RequestMode));
        assert!(!rule.declares(CheckKind::FeedFile));
    }

    #[test]
    fn test_threshold_fallback() {
        let own = Threshold {
            expected_count: Some(10),
            completeness_ratio: None,
        };
        let merged = own.or(Threshold {
            expected_count: Some(99),
            completeness_ratio: Some(0.9),
        });
        assert_eq!(merged.expected_count, Some(10));
        assert_eq!(merged.completeness_ratio, Some(0.9));
    }

    #[test]
    fn test_enumeration_case_sensitivity() {
        let set = EnumerationSet::new("STATUS_ENUM", ["ACTIVE", "INACTIVE"]);
        assert!(set.contains("ACTIVE", true));
        assert!(!set.contains("active", true));
        assert!(set.contains("active", false));
    }

    #[test]
    fn test_enumeration_catalog_merges_values() {
        let mut catalog = EnumerationCatalog::new();
        catalog.add_value("STATUS_ENUM", "ACTIVE");
        catalog.add_value("STATUS_ENUM", "INACTIVE");
        catalog.add_value("TYPE_ENUM", "DEBIT");

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.get("STATUS_ENUM").map(|s| s.allowed_values.len()),
            Some(2)
        );
    }

    #[test]
    fn test_rule_ref_display() {
        let rule = RuleBuilder::new("CUSTOMER_FEED", "server1", "CUSTOMER_STG", "AGE").build();
        assert_eq!(
            rule.reference().to_string(),
            "server1.CUSTOMER_STG.AGE [CUSTOMER_FEED]"
        );
        assert_eq!(
            rule.reference().table_level().to_string(),
            "server1.CUSTOMER_STG [CUSTOMER_FEED]"
        );
    }
}
