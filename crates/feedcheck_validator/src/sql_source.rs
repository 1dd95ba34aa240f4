//! SQL data source backed by DataFusion.
//!
//! Each `database.table` pair is registered in a single [`SessionContext`]
//! under the name `<database>__<table>`, lower-cased. Checks are answered
//! with plain SQL so filters from the metadata workbook can be passed
//! through untouched.

use crate::{
    DataAccessError, DataSource, DataValue, QueryResult, QuerySpec, Watermark, WatermarkStore,
};
use async_trait::async_trait;
use datafusion::arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, StringViewArray,
};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::arrow::util::display::array_value_to_string;
use datafusion::prelude::{CsvReadOptions, SessionContext};
use feedcheck_core::TableTarget;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Data source running SQL against tables registered in DataFusion.
#[derive(Clone)]
pub struct SqlSource {
    ctx: SessionContext,
    watermarks: Option<Arc<dyn WatermarkStore>>,
}

impl fmt::Debug for SqlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlSource")
            .field("session", &self.ctx.session_id())
            .field("watermarks", &self.watermarks)
            .finish()
    }
}

fn registered_name(database: &str, table: &str) -> String {
    format!("{database}__{table}").to_ascii_lowercase()
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

impl SqlSource {
    /// Creates a source with an empty session.
    pub fn new() -> Self {
        Self::with_context(SessionContext::new())
    }

    /// Wraps an existing session; tables must follow the `<db>__<table>` naming.
    pub fn with_context(ctx: SessionContext) -> Self {
        Self {
            ctx,
            watermarks: None,
        }
    }

    /// Attaches the store consulted for Insert/Append watermarks.
    pub fn with_watermarks(mut self, store: Arc<dyn WatermarkStore>) -> Self {
        self.watermarks = Some(store);
        self
    }

    /// Registers a CSV file (with a header row) as `database.table`.
    pub async fn register_csv(
        &self,
        database: &str,
        table: &str,
        path: impl AsRef<Path>,
    ) -> Result<(), DataAccessError> {
        let path = path.as_ref();
        let location = path.to_string_lossy();
        let name = registered_name(database, table);

        self.ctx
            .register_csv(&name, location.as_ref(), CsvReadOptions::default())
            .await
            .map_err(|e| DataAccessError::query(format!("{database}.{table}"), e.to_string()))?;

        info!(database, table, path = %path.display(), "Registered CSV table");
        Ok(())
    }

    /// Resolves a column name case-insensitively, returning the stored spelling
    /// and its Arrow type.
    async fn resolve_column(
        &self,
        database: &str,
        table: &str,
        column: &str,
    ) -> Result<Option<(String, String)>, DataAccessError> {
        let qualified = format!("{database}.{table}");
        let df = self
            .ctx
            .table(registered_name(database, table))
            .await
            .map_err(|_| DataAccessError::UnknownTable(qualified))?;

        let schema = df.schema();
        let found = schema
            .fields()
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(column))
            .map(|f| (f.name().clone(), f.data_type().to_string()));
        Ok(found)
    }

    async fn existing_column(
        &self,
        database: &str,
        table: &str,
        column: &str,
    ) -> Result<String, DataAccessError> {
        self.resolve_column(database, table, column)
            .await?
            .map(|(name, _)| name)
            .ok_or_else(|| DataAccessError::unknown_column(format!("{database}.{table}"), column))
    }

    async fn collect(
        &self,
        database: &str,
        table: &str,
        sql: &str,
    ) -> Result<Vec<RecordBatch>, DataAccessError> {
        debug!(database, table, sql, "Running query");
        let qualified = format!("{database}.{table}");
        let df = self
            .ctx
            .sql(sql)
            .await
            .map_err(|e| DataAccessError::query(&qualified, e.to_string()))?;
        df.collect()
            .await
            .map_err(|e| DataAccessError::query(&qualified, e.to_string()))
    }

    async fn count(
        &self,
        database: &str,
        table: &str,
        sql: &str,
    ) -> Result<u64, DataAccessError> {
        let batches = self.collect(database, table, sql).await?;
        let value = batches
            .first()
            .filter(|b| b.num_rows() > 0)
            .and_then(|b| b.column(0).as_any().downcast_ref::<Int64Array>())
            .map(|array| array.value(0))
            .ok_or_else(|| {
                DataAccessError::query(format!("{database}.{table}"), "count returned no rows")
            })?;
        Ok(u64::try_from(value).unwrap_or(0))
    }

    fn from_clause(database: &str, table: &str, filter: Option<&str>) -> String {
        let mut clause = format!("FROM {}", quote(&registered_name(database, table)));
        if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
            clause.push_str(" WHERE ");
            clause.push_str(filter);
        }
        clause
    }
}

impl Default for SqlSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts one Arrow cell into a [`DataValue`].
fn cell(array: &ArrayRef, row: usize) -> DataValue {
    if array.is_null(row) {
        return DataValue::Null;
    }
    let any = array.as_any();
    if let Some(values) = any.downcast_ref::<Int64Array>() {
        DataValue::Int(values.value(row))
    } else if let Some(values) = any.downcast_ref::<Float64Array>() {
        DataValue::Float(values.value(row))
    } else if let Some(values) = any.downcast_ref::<BooleanArray>() {
        DataValue::Bool(values.value(row))
    } else if let Some(values) = any.downcast_ref::<StringArray>() {
        DataValue::String(values.value(row).to_string())
    } else if let Some(values) = any.downcast_ref::<StringViewArray>() {
        DataValue::String(values.value(row).to_string())
    } else {
        array_value_to_string(array.as_ref(), row)
            .map(DataValue::String)
            .unwrap_or(DataValue::Null)
    }
}

#[async_trait]
impl DataSource for SqlSource {
    async fn execute(
        &self,
        database: &str,
        table: &str,
        query: &QuerySpec,
    ) -> Result<QueryResult, DataAccessError> {
        match query {
            QuerySpec::ColumnType { column } => {
                let found = self.resolve_column(database, table, column).await?;
                Ok(QueryResult::ColumnType(found.map(|(_, data_type)| data_type)))
            }
            QuerySpec::RowCount { filter } => {
                let sql = format!(
                    "SELECT COUNT(*) AS n {}",
                    Self::from_clause(database, table, filter.as_deref())
                );
                Ok(QueryResult::Count(self.count(database, table, &sql).await?))
            }
            QuerySpec::NullCount { column, filter } => {
                let column = self.existing_column(database, table, column).await?;
                let sql = format!(
                    "SELECT COUNT(*) - COUNT({}) AS n {}",
                    quote(&column),
                    Self::from_clause(database, table, filter.as_deref())
                );
                Ok(QueryResult::Count(self.count(database, table, &sql).await?))
            }
            QuerySpec::ColumnValues { column, filter } => {
                let column = self.existing_column(database, table, column).await?;
                let sql = format!(
                    "SELECT {} {}",
                    quote(&column),
                    Self::from_clause(database, table, filter.as_deref())
                );
                let batches = self.collect(database, table, &sql).await?;
                let mut values = Vec::new();
                for batch in &batches {
                    let array = batch.column(0);
                    values.extend((0..batch.num_rows()).map(|row| cell(array, row)));
                }
                Ok(QueryResult::Values(values))
            }
        }
    }

    async fn watermark(&self, target: &TableTarget) -> Result<Option<Watermark>, DataAccessError> {
        match &self.watermarks {
            Some(store) => store.get(target),
            None => Ok(None),
        }
    }

    fn description(&self) -> String {
        "DataFusion SQL".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    async fn customers() -> (tempfile::TempDir, SqlSource) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "CUSTOMER_ID,STATUS,AGE").unwrap();
        writeln!(file, "1,ACTIVE,25").unwrap();
        writeln!(file, "2,CLOSED,").unwrap();
        writeln!(file, "3,ACTIVE,130").unwrap();
        drop(file);

        let source = SqlSource::new();
        source
            .register_csv("server1", "CUSTOMER_STG", &path)
            .await
            .unwrap();
        (dir, source)
    }

    #[tokio::test]
    async fn test_row_count_with_filter() {
        let (_dir, source) = customers().await;
        let all = source
            .execute("server1", "CUSTOMER_STG", &QuerySpec::RowCount { filter: None })
            .await
            .unwrap();
        assert_eq!(all, QueryResult::Count(3));

        let active = source
            .execute(
                "server1",
                "CUSTOMER_STG",
                &QuerySpec::RowCount {
                    filter: Some("\"STATUS\" = 'ACTIVE'".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(active, QueryResult::Count(2));
    }

    #[tokio::test]
    async fn test_column_type_and_values() {
        let (_dir, source) = customers().await;
        let result = source
            .execute(
                "server1",
                "customer_stg",
                &QuerySpec::ColumnType {
                    column: "age".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(result, QueryResult::ColumnType(Some("Int64".into())));

        let values = source
            .execute(
                "server1",
                "CUSTOMER_STG",
                &QuerySpec::ColumnValues {
                    column: "AGE".into(),
                    filter: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(
            values,
            QueryResult::Values(vec![
                DataValue::Int(25),
                DataValue::Null,
                DataValue::Int(130)
            ])
        );
    }

    #[tokio::test]
    async fn test_null_count() {
        let (_dir, source) = customers().await;
        let result = source
            .execute(
                "server1",
                "CUSTOMER_STG",
                &QuerySpec::NullCount {
                    column: "AGE".into(),
                    filter: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(result, QueryResult::Count(1));
    }

    #[tokio::test]
    async fn test_missing_table_and_column() {
        let (_dir, source) = customers().await;
        let err = source
            .execute("server1", "NOPE", &QuerySpec::RowCount { filter: None })
            .await
            .unwrap_err();
        assert!(matches!(err, DataAccessError::Query { .. }));

        let missing = source
            .execute(
                "server1",
                "CUSTOMER_STG",
                &QuerySpec::ColumnType {
                    column: "EMAIL".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(missing, QueryResult::ColumnType(None));
    }
}
