//! Builder for validation rules.
//!
//! The normalizer produces rules from metadata rows; this builder is the
//! programmatic way to create them, mostly used by tests and embedders.

use crate::{RequestMode, RuleOrigin, Threshold, ValidationRule};

/// Builder for creating a [`ValidationRule`].
///
/// Flags default to `false`, matching how the normalizer treats blank cells.
///
/// # Example
///
/// ```rust
/// use feedcheck_core::{RequestMode, RuleBuilder};
///
/// let rule = RuleBuilder::new("CUSTOMER_FEED", "server1", "CUSTOMER_STG", "AGE")
///     .data_type("INTEGER")
///     .mandatory(true)
///     .range(0.0, 120.0)
///     .request_mode(RequestMode::Append)
///     .build();
///
/// assert!(rule.rejects_nulls());
/// assert_eq!(rule.range(), Some((0.0, 120.0)));
/// ```
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    rule: ValidationRule,
}

impl RuleBuilder {
    /// Creates a builder with the identifying columns set.
    pub fn new(
        feed: impl Into<String>,
        database: impl Into<String>,
        table: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        let feed = feed.into();
        Self {
            rule: ValidationRule {
                origin: RuleOrigin::FeedToStaging,
                row: 0,
                module: feed.clone(),
                feed_files: vec![feed.clone()],
                feed,
                field_name: field.into(),
                database_name: database.into(),
                table_name: table.into(),
                data_type: String::new(),
                nullable: false,
                mandatory: false,
                unique: false,
                request_mode: None,
                default_value: None,
                enumeration_name: None,
                unresolved_enumeration: None,
                range_bottom: None,
                range_top: None,
                range_declared: false,
                where_clause: None,
                threshold: Threshold::default(),
            },
        }
    }

    /// Sets the sheet of origin.
    pub fn origin(mut self, origin: RuleOrigin) -> Self {
        self.rule.origin = origin;
        self
    }

    /// Sets the row index.
    pub fn row(mut self, row: usize) -> Self {
        self.rule.row = row;
        self
    }

    /// Sets the module name.
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.rule.module = module.into();
        self
    }

    /// Sets the declared data type.
    pub fn data_type(mut self, data_type: impl Into<String>) -> Self {
        self.rule.data_type = data_type.into();
        self
    }

    /// Sets whether the field is nullable.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.rule.nullable = nullable;
        self
    }

    /// Sets whether the field is mandatory.
    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.rule.mandatory = mandatory;
        self
    }

    /// Sets whether the field must be unique.
    pub fn unique(mut self, unique: bool) -> Self {
        self.rule.unique = unique;
        self
    }

    /// Sets the request mode.
    pub fn request_mode(mut self, mode: RequestMode) -> Self {
        self.rule.request_mode = Some(mode);
        self
    }

    /// Sets the default value.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.rule.default_value = Some(value.into());
        self
    }

    /// References a resolved enumeration.
    pub fn enumeration(mut self, name: impl Into<String>) -> Self {
        self.rule.enumeration_name = Some(name.into());
        self
    }

    /// Records an enumeration reference that could not be resolved.
    pub fn unresolved_enumeration(mut self, name: impl Into<String>) -> Self {
        self.rule.unresolved_enumeration = Some(name.into());
        self
    }

    /// Sets both inclusive range bounds.
    pub fn range(mut self, bottom: f64, top: f64) -> Self {
        self.rule.range_bottom = Some(bottom);
        self.rule.range_top = Some(top);
        self.rule.range_declared = true;
        self
    }

    /// Sets only the lower bound.
    pub fn range_bottom(mut self, bottom: f64) -> Self {
        self.rule.range_bottom = Some(bottom);
        self.rule.range_declared = true;
        self
    }

    /// Sets the row filter.
    pub fn where_clause(mut self, clause: impl Into<String>) -> Self {
        self.rule.where_clause = Some(clause.into());
        self
    }

    /// Sets the expected row count.
    pub fn expected_count(mut self, count: u64) -> Self {
        self.rule.threshold.expected_count = Some(count);
        self
    }

    /// Sets the completeness ratio.
    pub fn completeness_ratio(mut self, ratio: f64) -> Self {
        self.rule.threshold.completeness_ratio = Some(ratio);
        self
    }

    /// Sets the feed files named by the feed cell.
    pub fn feed_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rule.feed_files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Builds the rule.
    pub fn build(self) -> ValidationRule {
        self.rule
    }
}
