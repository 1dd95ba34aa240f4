//! In-memory data source.
//!
//! Backs mock mode and the test suite. Tables are held column by column;
//! lookups of databases, tables and columns ignore case the way most SQL
//! engines do. Latency and failures can be injected per table or column.

use crate::{
    DataAccessError, DataSource, DataValue, QueryResult, QuerySpec, Watermark, WatermarkStore,
};
use async_trait::async_trait;
use feedcheck_core::TableTarget;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone)]
struct MemoryColumn {
    name: String,
    data_type: String,
    values: Vec<DataValue>,
}

/// A table held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    columns: Vec<MemoryColumn>,
    rows: usize,
}

impl MemoryTable {
    /// Creates a table with no columns and no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column. Shorter columns are padded with nulls on read.
    pub fn with_column<I, V>(mut self, name: &str, data_type: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DataValue>,
    {
        let values: Vec<DataValue> = values.into_iter().map(Into::into).collect();
        self.rows = self.rows.max(values.len());
        self.columns.push(MemoryColumn {
            name: name.to_string(),
            data_type: data_type.to_string(),
            values,
        });
        self
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    fn column(&self, name: &str) -> Option<&MemoryColumn> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn value(&self, column: &MemoryColumn, row: usize) -> DataValue {
        column.values.get(row).cloned().unwrap_or(DataValue::Null)
    }

    /// Row indices kept by an equality filter such as `STATUS = 'ACTIVE'`.
    fn filtered_rows(&self, table: &str, filter: Option<&str>) -> Result<Vec<usize>, DataAccessError> {
        let Some(filter) = filter else {
            return Ok((0..self.rows).collect());
        };

        let (column, literal) = filter.split_once('=').ok_or_else(|| {
            DataAccessError::unsupported(format!(
                "in-memory tables only support `column = value` filters, got '{filter}'"
            ))
        })?;
        let column_name = column.trim();
        let literal = literal.trim().trim_matches(|c| c == '\'' || c == '"');
        let column = self
            .column(column_name)
            .ok_or_else(|| DataAccessError::unknown_column(table, column_name))?;

        Ok((0..self.rows)
            .filter(|&row| {
                let value = self.value(column, row);
                !value.is_null() && value.to_string() == literal
            })
            .collect())
    }
}

/// Data source answering queries from [`MemoryTable`]s.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    tables: BTreeMap<String, MemoryTable>,
    latency: BTreeMap<String, Duration>,
    failures: BTreeMap<String, DataAccessError>,
    watermarks: Option<Arc<dyn WatermarkStore>>,
}

fn table_key(database: &str, table: &str) -> String {
    format!("{database}.{table}").to_ascii_lowercase()
}

fn column_key(database: &str, table: &str, column: &str) -> String {
    format!("{database}.{table}.{column}").to_ascii_lowercase()
}

impl InMemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a table.
    pub fn with_table(mut self, database: &str, table: &str, data: MemoryTable) -> Self {
        self.tables.insert(table_key(database, table), data);
        self
    }

    /// Delays every query against a table.
    pub fn with_latency(mut self, database: &str, table: &str, delay: Duration) -> Self {
        self.latency.insert(table_key(database, table), delay);
        self
    }

    /// Delays queries touching one column of a table.
    pub fn with_column_latency(
        mut self,
        database: &str,
        table: &str,
        column: &str,
        delay: Duration,
    ) -> Self {
        self.latency.insert(column_key(database, table, column), delay);
        self
    }

    /// Makes every query against a table fail with `error`.
    pub fn with_failure(mut self, database: &str, table: &str, error: DataAccessError) -> Self {
        self.failures.insert(table_key(database, table), error);
        self
    }

    /// Attaches the store consulted for Insert/Append watermarks.
    pub fn with_watermarks(mut self, store: Arc<dyn WatermarkStore>) -> Self {
        self.watermarks = Some(store);
        self
    }

    fn delay_for(&self, database: &str, table: &str, query: &QuerySpec) -> Option<Duration> {
        query
            .column()
            .and_then(|c| self.latency.get(&column_key(database, table, c)))
            .or_else(|| self.latency.get(&table_key(database, table)))
            .copied()
    }

    fn answer(
        &self,
        database: &str,
        table: &str,
        query: &QuerySpec,
    ) -> Result<QueryResult, DataAccessError> {
        let qualified = format!("{database}.{table}");
        let data = self
            .tables
            .get(&table_key(database, table))
            .ok_or_else(|| DataAccessError::UnknownTable(qualified.clone()))?;

        match query {
            QuerySpec::ColumnType { column } => Ok(QueryResult::ColumnType(
                data.column(column).map(|c| c.data_type.clone()),
            )),
            QuerySpec::RowCount { filter } => {
                let rows = data.filtered_rows(&qualified, filter.as_deref())?;
                Ok(QueryResult::Count(rows.len() as u64))
            }
            QuerySpec::ColumnValues { column, filter } => {
                let col = data
                    .column(column)
                    .ok_or_else(|| DataAccessError::unknown_column(&qualified, column))?;
                let rows = data.filtered_rows(&qualified, filter.as_deref())?;
                Ok(QueryResult::Values(
                    rows.into_iter().map(|row| data.value(col, row)).collect(),
                ))
            }
            QuerySpec::NullCount { column, filter } => {
                let col = data
                    .column(column)
                    .ok_or_else(|| DataAccessError::unknown_column(&qualified, column))?;
                let rows = data.filtered_rows(&qualified, filter.as_deref())?;
                let nulls = rows
                    .into_iter()
                    .filter(|&row| data.value(col, row).is_null())
                    .count();
                Ok(QueryResult::Count(nulls as u64))
            }
        }
    }
}

#[async_trait]
impl DataSource for InMemorySource {
    async fn execute(
        &self,
        database: &str,
        table: &str,
        query: &QuerySpec,
    ) -> Result<QueryResult, DataAccessError> {
        trace!(database, table, ?query, "In-memory query");

        if let Some(delay) = self.delay_for(database, table, query) {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.failures.get(&table_key(database, table)) {
            return Err(error.clone());
        }
        self.answer(database, table, query)
    }

    async fn watermark(&self, target: &TableTarget) -> Result<Option<Watermark>, DataAccessError> {
        match &self.watermarks {
            Some(store) => store.get(target),
            None => Ok(None),
        }
    }

    fn description(&self) -> String {
        format!("in-memory ({} table(s))", self.tables.len())
    }
}
