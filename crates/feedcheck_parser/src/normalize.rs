//! Rule normalizer.
//!
//! Turns raw [`MetadataRow`]s into typed [`ValidationRule`]s. This is the only
//! place that looks at cell text; a malformed row is rejected on its own and
//! never aborts the load.

use feedcheck_core::{
    BUSINESS_RULES, ENUMERATION, EngineConfig, EngineError, EnumerationCatalog, FEED_TO_STAGING,
    MetadataFormatError, MetadataRow, MetadataSource, PATTERNS, RECONCILIATIONS, RequestMode,
    RuleCatalog, RuleOrigin, RuleResolutionError, STAGING_TO_GRI, Threshold, TypeAliases,
    ValidationRule,
};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static FEED_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,|;]+").expect("Invalid feed separator regex"));

/// Splits a `Feed` cell listing several feed files (`a.csv, b.csv|c.csv`).
pub fn split_feed_list(raw: &str) -> Vec<String> {
    FEED_SEPARATOR
        .split(raw)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Column spellings for one sheet layout.
struct Columns {
    sheet: &'static str,
    origin: RuleOrigin,
    feed: &'static [&'static str],
    database: &'static [&'static str],
    table: &'static [&'static str],
    field: &'static [&'static str],
    data_type: &'static [&'static str],
    where_clause: &'static [&'static str],
}

const FEED_COLUMNS: Columns = Columns {
    sheet: FEED_TO_STAGING,
    origin: RuleOrigin::FeedToStaging,
    feed: &["Feed"],
    database: &["DBName"],
    table: &["DB Table"],
    field: &["FieldName"],
    data_type: &["DataType"],
    where_clause: &["Where_Clause"],
};

const STAGING_COLUMNS: Columns = Columns {
    sheet: STAGING_TO_GRI,
    origin: RuleOrigin::StagingToTarget,
    feed: &["Modules"],
    database: &["Trg_DBName", "Trg _DBName"],
    table: &["Trg _DB Table", "Trg_DB Table"],
    field: &["Trg _FieldName", "Trg_FieldName"],
    data_type: &["Trg _DataType", "Trg_DataType"],
    where_clause: &["Where_Clause_Trg", "Where_Clause"],
};

const AFFIRMATIVE: [&str; 3] = ["Y", "YES", "TRUE"];

/// Y/N flag: only an explicit affirmative is true; blank is false.
fn flag(row: &MetadataRow, column: &str) -> bool {
    row.get(column)
        .is_some_and(|v| AFFIRMATIVE.iter().any(|a| a.eq_ignore_ascii_case(v)))
}

/// A non-fatal problem found while normalizing a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeWarning {
    /// Sheet name
    pub sheet: String,
    /// Row index
    pub row: usize,
    /// Description
    pub message: String,
}

impl fmt::Display for NormalizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} row {}: {}", self.sheet, self.row, self.message)
    }
}

/// Everything produced by normalizing one or more sheets.
#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    /// Rules built, in sheet order
    pub rules: Vec<ValidationRule>,
    /// Rows rejected because an identifying column was blank
    pub rejected: Vec<MetadataFormatError>,
    /// Rules whose enumeration reference could not be resolved
    pub unresolved: Vec<RuleResolutionError>,
    /// Non-fatal problems (unparsable ranges, unknown request modes, ...)
    pub warnings: Vec<NormalizeWarning>,
    /// Rows deliberately skipped (blank module, `#` marker)
    pub skipped: usize,
}

impl NormalizeReport {
    fn merge(&mut self, other: NormalizeReport) {
        self.rules.extend(other.rules);
        self.rejected.extend(other.rejected);
        self.unresolved.extend(other.unresolved);
        self.warnings.extend(other.warnings);
        self.skipped += other.skipped;
    }
}

/// Converts metadata rows into validation rules.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    aliases: &'a TypeAliases,
}

impl<'a> Normalizer<'a> {
    /// Creates a normalizer using `aliases` to decide which types are numeric.
    pub fn new(aliases: &'a TypeAliases) -> Self {
        Self { aliases }
    }

    /// Normalizes the rows of one rule sheet.
    ///
    /// Deterministic: the same rows and enumerations always produce the same
    /// rules.
    pub fn normalize(
        &self,
        origin: RuleOrigin,
        rows: &[MetadataRow],
        enumerations: &EnumerationCatalog,
    ) -> NormalizeReport {
        let columns = match origin {
            RuleOrigin::FeedToStaging => &FEED_COLUMNS,
            RuleOrigin::StagingToTarget => &STAGING_COLUMNS,
        };

        let mut report = NormalizeReport::default();
        for row in rows {
            match self.normalize_row(columns, row, enumerations, &mut report.warnings) {
                Ok(Some((rule, unresolved))) => {
                    if let Some(err) = unresolved {
                        warn!("{err}");
                        report.unresolved.push(err);
                    }
                    report.rules.push(rule);
                }
                Ok(None) => report.skipped += 1,
                Err(err) => {
                    warn!("{err}");
                    report.rejected.push(err);
                }
            }
        }

        debug!(
            sheet = columns.sheet,
            rules = report.rules.len(),
            rejected = report.rejected.len(),
            skipped = report.skipped,
            "Normalized sheet"
        );
        report
    }

    fn normalize_row(
        &self,
        columns: &Columns,
        row: &MetadataRow,
        enumerations: &EnumerationCatalog,
        warnings: &mut Vec<NormalizeWarning>,
    ) -> Result<Option<(ValidationRule, Option<RuleResolutionError>)>, MetadataFormatError> {
        let sheet = columns.sheet;
        let index = row.index();

        if row.get("SkipRow").is_some_and(|v| v.starts_with('#')) {
            return Ok(None);
        }
        let Some(module) = row.get("Modules") else {
            return Ok(None);
        };
        let Some(feed) = row.first_of(columns.feed) else {
            return Ok(None);
        };

        let required = |names: &[&str]| {
            row.first_of(names)
                .map(str::to_string)
                .ok_or_else(|| MetadataFormatError::missing_column(sheet, index, names[0]))
        };
        let field_name = required(columns.field)?;
        let database_name = required(columns.database)?;
        let table_name = required(columns.table)?;

        let mut warn_row = |message: String| {
            warn!(sheet, row = index, "{message}");
            warnings.push(NormalizeWarning {
                sheet: sheet.to_string(),
                row: index,
                message,
            });
        };

        let data_type = row.first_of(columns.data_type).unwrap_or_default().to_string();

        let request_mode = match row.get("Request") {
            None => None,
            Some(raw) => {
                let mode = RequestMode::parse(raw);
                if mode.is_none() {
                    warn_row(format!("unknown Request value '{raw}', expected Insert or Append"));
                }
                mode
            }
        };

        let bottom_raw = row.get("RangeBottom");
        let top_raw = row.get("RangeTop");
        let range_declared = bottom_raw.is_some() || top_raw.is_some();
        let (mut range_bottom, mut range_top) = (None, None);
        if range_declared {
            if self.aliases.is_numeric(&data_type) {
                let mut parse_bound = |column: &str, raw: Option<&str>| {
                    raw.and_then(|v| match v.parse::<f64>() {
                        Ok(n) if n.is_finite() => Some(n),
                        _ => {
                            warn_row(format!("{column} '{v}' is not a number, bound ignored"));
                            None
                        }
                    })
                };
                range_bottom = parse_bound("RangeBottom", bottom_raw);
                range_top = parse_bound("RangeTop", top_raw);

                if let (Some(b), Some(t)) = (range_bottom, range_top) {
                    if b > t {
                        warn_row(format!("RangeBottom {b} is greater than RangeTop {t}, range ignored"));
                        range_bottom = None;
                        range_top = None;
                    }
                }
            } else {
                warn_row(format!(
                    "range declared on non-numeric type '{data_type}', range ignored"
                ));
            }
        }

        let expected_count = row.get("ExpectedCount").and_then(|v| match v.parse::<u64>() {
            Ok(n) => Some(n),
            Err(_) => {
                warn_row(format!("ExpectedCount '{v}' is not a non-negative integer"));
                None
            }
        });
        let completeness_ratio =
            row.get("CompletenessRatio")
                .and_then(|v| match v.parse::<f64>() {
                    Ok(r) if (0.0..=1.0).contains(&r) => Some(r),
                    _ => {
                        warn_row(format!("CompletenessRatio '{v}' must be between 0 and 1"));
                        None
                    }
                });

        let mut rule = ValidationRule {
            origin: columns.origin,
            row: index,
            feed: feed.to_string(),
            feed_files: match columns.origin {
                RuleOrigin::FeedToStaging => split_feed_list(feed),
                RuleOrigin::StagingToTarget => Vec::new(),
            },
            module: module.to_string(),
            field_name,
            database_name,
            table_name,
            data_type,
            nullable: flag(row, "Nullable"),
            mandatory: flag(row, "Mandatory"),
            unique: flag(row, "Unique"),
            request_mode,
            default_value: row.get("Default").map(str::to_string),
            enumeration_name: None,
            unresolved_enumeration: None,
            range_bottom,
            range_top,
            range_declared,
            where_clause: row.first_of(columns.where_clause).map(str::to_string),
            threshold: Threshold {
                expected_count,
                completeness_ratio,
            },
        };

        let mut unresolved = None;
        if let Some(name) = row.get("Enumeration") {
            if enumerations.get(name).is_some() {
                rule.enumeration_name = Some(name.to_string());
            } else {
                rule.unresolved_enumeration = Some(name.to_string());
                unresolved = Some(RuleResolutionError {
                    rule: rule.reference(),
                    enumeration: name.to_string(),
                });
            }
        }

        Ok(Some((rule, unresolved)))
    }
}

/// Reads the Enumeration sheet. Rows sharing a name are merged.
pub fn read_enumerations(source: &dyn MetadataSource) -> EnumerationCatalog {
    let mut catalog = EnumerationCatalog::new();
    let Some(rows) = source.sheet(ENUMERATION) else {
        warn!("{ENUMERATION} sheet not found");
        return catalog;
    };

    for row in rows {
        match (row.get("EnumerationName"), row.get("EnumValues")) {
            (Some(name), Some(value)) => catalog.add_value(name, value),
            (Some(name), None) => debug!(name, row = row.index(), "Enumeration row without value"),
            _ => {}
        }
    }
    catalog
}

/// Result of loading a catalog from a workbook.
#[derive(Debug)]
pub struct LoadedCatalog {
    /// Rules and enumerations ready for a run
    pub catalog: RuleCatalog,
    /// Rows rejected during normalization
    pub rejected: Vec<MetadataFormatError>,
    /// Rules with unresolved enumeration references
    pub unresolved: Vec<RuleResolutionError>,
    /// Normalization warnings
    pub warnings: Vec<NormalizeWarning>,
    /// Rows skipped on purpose
    pub skipped: usize,
    /// Row counts of sheets that are read but not evaluated
    pub placeholder_rows: BTreeMap<String, usize>,
}

/// Normalizes every rule sheet of a workbook into a catalog.
///
/// Fails only when the workbook has no rows at all or when no row produced
/// a rule.
pub fn load_catalog(
    source: &dyn MetadataSource,
    config: &EngineConfig,
) -> Result<LoadedCatalog, EngineError> {
    if source.total_rows() == 0 {
        return Err(EngineError::NoMetadataRows);
    }

    let enumerations = read_enumerations(source);
    let normalizer = Normalizer::new(&config.type_aliases);

    let mut report = NormalizeReport::default();
    for origin in [RuleOrigin::FeedToStaging, RuleOrigin::StagingToTarget] {
        let sheet = match origin {
            RuleOrigin::FeedToStaging => FEED_TO_STAGING,
            RuleOrigin::StagingToTarget => STAGING_TO_GRI,
        };
        match source.sheet(sheet) {
            Some(rows) => report.merge(normalizer.normalize(origin, rows, &enumerations)),
            None => warn!("{sheet} sheet not found"),
        }
    }

    let placeholder_rows: BTreeMap<String, usize> = [PATTERNS, RECONCILIATIONS, BUSINESS_RULES]
        .into_iter()
        .filter_map(|name| source.sheet(name).map(|rows| (name.to_string(), rows.len())))
        .collect();

    let NormalizeReport {
        rules,
        rejected,
        unresolved,
        warnings,
        skipped,
    } = report;

    info!(
        rules = rules.len(),
        enumerations = enumerations.len(),
        rejected = rejected.len(),
        unresolved = unresolved.len(),
        "Loaded metadata"
    );

    let catalog = RuleCatalog::with_rejected(rules, enumerations, rejected.len())?;
    Ok(LoadedCatalog {
        catalog,
        rejected,
        unresolved,
        warnings,
        skipped,
        placeholder_rows,
    })
}
