//! Rule catalog: the in-memory set of validation rules for one run.

use crate::{EngineError, EnumerationCatalog, EnumerationSet, Result, Selection, ValidationRule};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Database + table + feed combination that table-level checks run against.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableTarget {
    /// Database name
    pub database: String,
    /// Table name
    pub table: String,
    /// Feed name
    pub feed: String,
}

impl TableTarget {
    /// Target of a rule.
    pub fn of(rule: &ValidationRule) -> Self {
        Self {
            database: rule.database_name.clone(),
            table: rule.table_name.clone(),
            feed: rule.feed.clone(),
        }
    }
}

/// Owns every rule and enumeration for a run.
///
/// Read-only once built; rules are reference counted so workers can hold
/// them without borrowing the catalog.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    rules: Vec<Arc<ValidationRule>>,
    enumerations: Arc<EnumerationCatalog>,
}

impl RuleCatalog {
    /// Builds a catalog. Fails when there is not a single rule.
    pub fn new(rules: Vec<ValidationRule>, enumerations: EnumerationCatalog) -> Result<Self> {
        Self::with_rejected(rules, enumerations, 0)
    }

    /// Builds a catalog, reporting how many rows were rejected when it is empty.
    pub fn with_rejected(
        rules: Vec<ValidationRule>,
        enumerations: EnumerationCatalog,
        rejected: usize,
    ) -> Result<Self> {
        if rules.is_empty() {
            return Err(EngineError::NoResolvableRules { rejected });
        }
        Ok(Self {
            rules: rules.into_iter().map(Arc::new).collect(),
            enumerations: Arc::new(enumerations),
        })
    }

    /// All rules, in load order.
    pub fn rules(&self) -> &[Arc<ValidationRule>] {
        &self.rules
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Always false for a constructed catalog.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Shared enumeration catalog.
    pub fn enumerations(&self) -> Arc<EnumerationCatalog> {
        Arc::clone(&self.enumerations)
    }

    /// Looks up an enumeration.
    pub fn enumeration(&self, name: &str) -> Option<&EnumerationSet> {
        self.enumerations.get(name)
    }

    /// Distinct feed names.
    pub fn feeds(&self) -> BTreeSet<&str> {
        self.rules.iter().map(|r| r.feed.as_str()).collect()
    }

    /// Distinct database names.
    pub fn databases(&self) -> BTreeSet<&str> {
        self.rules.iter().map(|r| r.database_name.as_str()).collect()
    }

    /// Rules passing a selection.
    pub fn select(&self, selection: &Selection) -> Vec<Arc<ValidationRule>> {
        selection.select(self.rules.iter().cloned())
    }

    /// Groups rules by table target, keeping load order inside each group.
    pub fn group_by_target(
        rules: &[Arc<ValidationRule>],
    ) -> BTreeMap<TableTarget, Vec<Arc<ValidationRule>>> {
        let mut targets: BTreeMap<TableTarget, Vec<Arc<ValidationRule>>> = BTreeMap::new();
        for rule in rules {
            targets
                .entry(TableTarget::of(rule))
                .or_default()
                .push(Arc::clone(rule));
        }
        targets
    }
}
