//! Schema checks: declared data type and null handling.

use crate::{CheckContext, ColumnChecker, DataSource, QuerySpec, access_error};
use async_trait::async_trait;
use feedcheck_core::{CheckKind, CheckOutcome, ValidationRule};

/// Compares the declared type with the one reported by the data source.
///
/// Both spellings go through the configured alias table, so `VARCHAR(50)`
/// declared in the workbook matches an Arrow `Utf8` column.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataTypeChecker;

#[async_trait]
impl ColumnChecker for DataTypeChecker {
    fn kind(&self) -> CheckKind {
        CheckKind::DataType
    }

    async fn check(
        &self,
        rule: &ValidationRule,
        source: &dyn DataSource,
        ctx: &CheckContext,
    ) -> CheckOutcome {
        let reference = rule.reference();
        let observed = match ctx.column_type(source, rule).await {
            Ok(observed) => observed,
            Err(err) => return access_error(reference, self.kind(), &err),
        };

        let Some(observed) = observed else {
            return CheckOutcome::fail(
                reference,
                self.kind(),
                format!("column '{}' not found", rule.field_name),
            );
        };

        let aliases = &ctx.config().type_aliases;
        let declared = aliases.canonicalize(&rule.data_type);
        let actual = aliases.canonicalize(&observed);
        if declared == actual {
            CheckOutcome::pass(reference, self.kind(), format!("type {declared}"))
                .with_observed([observed])
        } else {
            CheckOutcome::fail(
                reference,
                self.kind(),
                format!("declared {declared}, observed {actual} ({observed})"),
            )
            .with_observed([observed])
        }
    }
}

/// Counts nulls in columns that are mandatory or not nullable.
#[derive(Debug, Clone, Copy, Default)]
pub struct MandatoryChecker;

#[async_trait]
impl ColumnChecker for MandatoryChecker {
    fn kind(&self) -> CheckKind {
        CheckKind::Mandatory
    }

    async fn check(
        &self,
        rule: &ValidationRule,
        source: &dyn DataSource,
        ctx: &CheckContext,
    ) -> CheckOutcome {
        let reference = rule.reference();
        let query = QuerySpec::NullCount {
            column: rule.field_name.clone(),
            filter: rule.where_clause.clone(),
        };
        match ctx
            .count(source, &rule.database_name, &rule.table_name, query)
            .await
        {
            Ok(0) => CheckOutcome::pass(reference, self.kind(), "no null values"),
            Ok(nulls) => {
                CheckOutcome::fail(reference, self.kind(), format!("{nulls} null value(s)"))
                    .with_observed([nulls.to_string()])
            }
            Err(err) => access_error(reference, self.kind(), &err),
        }
    }
}
