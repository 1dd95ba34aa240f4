//! Checker contracts and the context shared by every check.
//!
//! A checker evaluates one validation kind and always produces exactly one
//! [`CheckOutcome`]. Collaborator failures become ERROR outcomes inside the
//! checker; they are never propagated to the engine.

use crate::{
    CompletenessChecker, DataAccessError, DataSource, DataTypeChecker, DataValue,
    EnumerationChecker, MandatoryChecker, QueryResult, QuerySpec, RangeChecker,
    RequestModeChecker, RowCountChecker, UniqueChecker, Watermark,
};
use async_trait::async_trait;
use feedcheck_core::{
    CheckKind, CheckOutcome, EngineConfig, EnumerationCatalog, RuleRef, TableTarget,
    ValidationRule,
};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

/// Read-only state handed to every checker.
#[derive(Debug, Clone)]
pub struct CheckContext {
    config: Arc<EngineConfig>,
    enumerations: Arc<EnumerationCatalog>,
}

impl CheckContext {
    /// Creates a context.
    pub fn new(config: Arc<EngineConfig>, enumerations: Arc<EnumerationCatalog>) -> Self {
        Self {
            config,
            enumerations,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Enumerations known to the run.
    pub fn enumerations(&self) -> &EnumerationCatalog {
        &self.enumerations
    }

    /// Runs a collaborator call under the configured timeout.
    pub async fn timed<T, F>(&self, call: F) -> Result<T, DataAccessError>
    where
        F: Future<Output = Result<T, DataAccessError>>,
    {
        let limit = self.config.query_timeout();
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| DataAccessError::Timeout(limit))?
    }

    /// Runs one query against `database.table` under the configured timeout.
    pub async fn query(
        &self,
        source: &dyn DataSource,
        database: &str,
        table: &str,
        query: &QuerySpec,
    ) -> Result<QueryResult, DataAccessError> {
        self.timed(source.execute(database, table, query)).await
    }

    /// Runs a counting query.
    pub async fn count(
        &self,
        source: &dyn DataSource,
        database: &str,
        table: &str,
        query: QuerySpec,
    ) -> Result<u64, DataAccessError> {
        match self.query(source, database, table, &query).await? {
            QueryResult::Count(n) => Ok(n),
            other => Err(unexpected(database, table, &other)),
        }
    }

    /// Fetches every value of a column.
    pub async fn values(
        &self,
        source: &dyn DataSource,
        rule: &ValidationRule,
    ) -> Result<Vec<DataValue>, DataAccessError> {
        let query = QuerySpec::ColumnValues {
            column: rule.field_name.clone(),
            filter: rule.where_clause.clone(),
        };
        match self
            .query(source, &rule.database_name, &rule.table_name, &query)
            .await?
        {
            QueryResult::Values(values) => Ok(values),
            other => Err(unexpected(&rule.database_name, &rule.table_name, &other)),
        }
    }

    /// Observed type of the rule's column, `None` when the column is missing.
    pub async fn column_type(
        &self,
        source: &dyn DataSource,
        rule: &ValidationRule,
    ) -> Result<Option<String>, DataAccessError> {
        let query = QuerySpec::ColumnType {
            column: rule.field_name.clone(),
        };
        match self
            .query(source, &rule.database_name, &rule.table_name, &query)
            .await?
        {
            QueryResult::ColumnType(data_type) => Ok(data_type),
            other => Err(unexpected(&rule.database_name, &rule.table_name, &other)),
        }
    }

    /// Watermark of a table target under the configured timeout.
    pub async fn watermark(
        &self,
        source: &dyn DataSource,
        target: &TableTarget,
    ) -> Result<Option<Watermark>, DataAccessError> {
        self.timed(source.watermark(target)).await
    }
}

fn unexpected(database: &str, table: &str, result: &QueryResult) -> DataAccessError {
    DataAccessError::query(
        format!("{database}.{table}"),
        format!("unexpected result shape: {result:?}"),
    )
}

/// Evaluates one kind against a single rule (column).
#[async_trait]
pub trait ColumnChecker: Send + Sync {
    /// Kind produced by this checker.
    fn kind(&self) -> CheckKind;

    /// Whether the rule declares anything this checker evaluates.
    fn applies_to(&self, rule: &ValidationRule) -> bool {
        rule.declares(self.kind())
    }

    /// Runs the check.
    async fn check(
        &self,
        rule: &ValidationRule,
        source: &dyn DataSource,
        ctx: &CheckContext,
    ) -> CheckOutcome;
}

/// Evaluates one kind against a whole table target.
#[async_trait]
pub trait TableChecker: Send + Sync {
    /// Kind produced by this checker.
    fn kind(&self) -> CheckKind;

    /// Whether any rule of the target declares this kind.
    fn applies_to(&self, rules: &[Arc<ValidationRule>]) -> bool {
        rules.iter().any(|r| r.declares(self.kind()))
    }

    /// Runs the check. `rules` is never empty.
    async fn check(
        &self,
        target: &TableTarget,
        rules: &[Arc<ValidationRule>],
        source: &dyn DataSource,
        ctx: &CheckContext,
    ) -> CheckOutcome;
}

/// Turns a collaborator failure into an ERROR outcome.
pub fn access_error(rule: RuleRef, kind: CheckKind, err: &DataAccessError) -> CheckOutcome {
    warn!(rule = %rule, kind = %kind, error = %err, "Check could not be performed");
    CheckOutcome::error(rule, kind, err.to_string())
}

/// Table-level reference for a target, taking module from its first rule.
pub fn table_reference(target: &TableTarget, rules: &[Arc<ValidationRule>]) -> RuleRef {
    rules
        .first()
        .map(|r| r.reference().table_level())
        .unwrap_or_else(|| RuleRef {
            feed: target.feed.clone(),
            module: String::new(),
            database: target.database.clone(),
            table: target.table.clone(),
            field: None,
        })
}

/// Row filter applied to table-level queries: the first one declared.
pub fn table_filter(rules: &[Arc<ValidationRule>]) -> Option<String> {
    rules.iter().find_map(|r| r.where_clause.clone())
}

/// First `limit` items rendered for an outcome message, with a tail count.
pub fn sample_list<T: Display>(items: &[T], limit: usize) -> String {
    let shown: Vec<String> = items.iter().take(limit).map(|i| i.to_string()).collect();
    let mut list = shown.join(", ");
    if items.len() > limit {
        list.push_str(&format!(" (+{} more)", items.len() - limit));
    }
    list
}

/// Column checkers run for every selected rule.
pub fn default_column_checkers() -> Vec<Arc<dyn ColumnChecker>> {
    vec![
        Arc::new(DataTypeChecker),
        Arc::new(MandatoryChecker),
        Arc::new(UniqueChecker),
        Arc::new(RangeChecker),
        Arc::new(EnumerationChecker),
    ]
}

/// Table checkers run once per database + table + feed.
pub fn default_table_checkers() -> Vec<Arc<dyn TableChecker>> {
    vec![
        Arc::new(RequestModeChecker),
        Arc::new(RowCountChecker),
        Arc::new(CompletenessChecker),
    ]
}
