//! Selection filter: narrows a catalog to the requested feeds, databases and kinds.

use crate::{CheckKind, ValidationRule};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;

/// Requested subset of a catalog.
///
/// An empty set means "no restriction" on that dimension. Feed and database
/// names are matched exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Feeds to keep
    #[serde(default)]
    pub feeds: BTreeSet<String>,

    /// Databases to keep
    #[serde(default)]
    pub databases: BTreeSet<String>,

    /// Validation kinds to run
    #[serde(default)]
    pub kinds: BTreeSet<CheckKind>,
}

impl Selection {
    /// A selection that keeps everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a selection from plain strings, parsing the kind names.
    pub fn from_strings<F, D, K>(feeds: F, databases: D, kinds: K) -> Result<Self, String>
    where
        F: IntoIterator,
        F::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        let kinds = kinds
            .into_iter()
            .map(|k| k.as_ref().parse::<CheckKind>())
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Self {
            feeds: feeds.into_iter().map(Into::into).collect(),
            databases: databases.into_iter().map(Into::into).collect(),
            kinds,
        })
    }

    /// Restricts to the given feeds.
    pub fn with_feeds<I, S>(mut self, feeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feeds.extend(feeds.into_iter().map(Into::into));
        self
    }

    /// Restricts to the given databases.
    pub fn with_databases<I, S>(mut self, databases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.databases.extend(databases.into_iter().map(Into::into));
        self
    }

    /// Restricts to the given kinds.
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = CheckKind>) -> Self {
        self.kinds.extend(kinds);
        self
    }

    /// Whether a feed passes the filter.
    pub fn allows_feed(&self, feed: &str) -> bool {
        self.feeds.is_empty() || self.feeds.contains(feed)
    }

    /// Whether a database passes the filter.
    pub fn allows_database(&self, database: &str) -> bool {
        self.databases.is_empty() || self.databases.contains(database)
    }

    /// Whether a kind should run.
    pub fn allows_kind(&self, kind: CheckKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }

    /// Whether a single rule passes the filter.
    ///
    /// With kinds selected, a rule is kept only if it declares at least one of them.
    pub fn matches(&self, rule: &ValidationRule) -> bool {
        self.allows_feed(&rule.feed)
            && self.allows_database(&rule.database_name)
            && (self.kinds.is_empty() || self.kinds.iter().any(|k| rule.declares(*k)))
    }

    /// Pure filter over a rule sequence. An empty result is valid.
    pub fn select<I, R>(&self, rules: I) -> Vec<R>
    where
        I: IntoIterator<Item = R>,
        R: Borrow<ValidationRule>,
    {
        rules
            .into_iter()
            .filter(|rule| self.matches(rule.borrow()))
            .collect()
    }
}
