//! Data quality checks.
//!
//! This module handles:
//! - Uniqueness: duplicate values in a single column
//! - Row count: non-empty tables and observed/expected ratios
//! - Completeness: average non-null ratio across a table's declared columns

use crate::{
    CheckContext, ColumnChecker, DataSource, QuerySpec, TableChecker, access_error, sample_list,
    table_filter, table_reference,
};
use async_trait::async_trait;
use feedcheck_core::{CheckKind, CheckOutcome, TableTarget, Threshold, ValidationRule};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Detects duplicate values.
///
/// Nulls are skipped when the column allows them. In a column that rejects
/// nulls every null counts as a value, so repeated nulls are duplicates.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueChecker;

#[async_trait]
impl ColumnChecker for UniqueChecker {
    fn kind(&self) -> CheckKind {
        CheckKind::Unique
    }

    async fn check(
        &self,
        rule: &ValidationRule,
        source: &dyn DataSource,
        ctx: &CheckContext,
    ) -> CheckOutcome {
        let reference = rule.reference();
        let values = match ctx.values(source, rule).await {
            Ok(values) => values,
            Err(err) => return access_error(reference, self.kind(), &err),
        };

        // Keep first-seen order so messages are stable
        let skip_nulls = !rule.rejects_nulls();
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut order = Vec::new();
        for value in values.iter().filter(|v| !(skip_nulls && v.is_null())) {
            let key = value.to_string();
            let count = seen.entry(key.clone()).or_insert(0);
            *count += 1;
            if *count == 2 {
                order.push(key);
            }
        }

        let limit = ctx.config().sample_size;
        if order.is_empty() {
            CheckOutcome::pass(reference, self.kind(), "all values distinct")
        } else {
            CheckOutcome::fail(
                reference,
                self.kind(),
                format!(
                    "{} duplicated value(s): {}",
                    order.len(),
                    sample_list(&order, limit)
                ),
            )
            .with_observed(order.into_iter().take(limit))
        }
    }
}

/// Compares a table's row count with its expected count.
///
/// An empty table always fails. Otherwise the observed/expected ratio must
/// reach the effective completeness ratio; without an expected count the
/// check is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowCountChecker;

#[async_trait]
impl TableChecker for RowCountChecker {
    fn kind(&self) -> CheckKind {
        CheckKind::RowCount
    }

    async fn check(
        &self,
        target: &TableTarget,
        rules: &[Arc<ValidationRule>],
        source: &dyn DataSource,
        ctx: &CheckContext,
    ) -> CheckOutcome {
        let reference = table_reference(target, rules);
        let query = QuerySpec::RowCount {
            filter: table_filter(rules),
        };
        let count = match ctx
            .count(source, &target.database, &target.table, query)
            .await
        {
            Ok(count) => count,
            Err(err) => return access_error(reference, self.kind(), &err),
        };

        let own = rules
            .iter()
            .fold(Threshold::default(), |acc, r| acc.or(r.threshold));
        let config = ctx.config();
        let expected = own
            .or(config.threshold_for(&target.database, &target.table))
            .expected_count;

        let observed = [count.to_string()];
        if count == 0 {
            return CheckOutcome::fail(reference, self.kind(), "table is empty")
                .with_observed(observed);
        }
        let Some(expected) = expected.filter(|e| *e > 0) else {
            return CheckOutcome::skipped(
                reference,
                self.kind(),
                format!("{count} row(s), no expected count configured"),
            )
            .with_observed(observed);
        };

        let ratio = count as f64 / expected as f64;
        let threshold = config.completeness_ratio(own, &target.database, &target.table);
        let message = format!(
            "{count} of {expected} expected row(s) ({:.2}%), threshold {:.2}%",
            ratio * 100.0,
            threshold * 100.0
        );
        if ratio < threshold {
            CheckOutcome::fail(reference, self.kind(), message).with_observed(observed)
        } else {
            CheckOutcome::pass(reference, self.kind(), message).with_observed(observed)
        }
    }
}

/// Average non-null ratio across the distinct columns declared for a table.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletenessChecker;

#[async_trait]
impl TableChecker for CompletenessChecker {
    fn kind(&self) -> CheckKind {
        CheckKind::Completeness
    }

    async fn check(
        &self,
        target: &TableTarget,
        rules: &[Arc<ValidationRule>],
        source: &dyn DataSource,
        ctx: &CheckContext,
    ) -> CheckOutcome {
        let reference = table_reference(target, rules);
        let filter = table_filter(rules);

        let total = match ctx
            .count(
                source,
                &target.database,
                &target.table,
                QuerySpec::RowCount {
                    filter: filter.clone(),
                },
            )
            .await
        {
            Ok(total) => total,
            Err(err) => return access_error(reference, self.kind(), &err),
        };
        if total == 0 {
            return CheckOutcome::fail(reference, self.kind(), "table is empty");
        }

        let mut columns = BTreeSet::new();
        let fields: Vec<&str> = rules
            .iter()
            .map(|r| r.field_name.as_str())
            .filter(|f| columns.insert(f.to_ascii_lowercase()))
            .collect();

        let mut ratios = Vec::with_capacity(fields.len());
        for field in &fields {
            let query = QuerySpec::NullCount {
                column: field.to_string(),
                filter: filter.clone(),
            };
            match ctx
                .count(source, &target.database, &target.table, query)
                .await
            {
                Ok(nulls) => ratios.push(total.saturating_sub(nulls) as f64 / total as f64),
                Err(err) => return access_error(reference, self.kind(), &err),
            }
        }

        let ratio = ratios.iter().sum::<f64>() / ratios.len().max(1) as f64;
        let own = rules
            .iter()
            .fold(Threshold::default(), |acc, r| acc.or(r.threshold));
        let threshold = ctx
            .config()
            .completeness_ratio(own, &target.database, &target.table);

        let observed = [format!("{ratio:.4}")];
        let message = format!(
            "{:.2}% complete across {} column(s), threshold {:.2}%",
            ratio * 100.0,
            fields.len(),
            threshold * 100.0
        );
        if ratio < threshold {
            CheckOutcome::fail(reference, self.kind(), message).with_observed(observed)
        } else {
            CheckOutcome::pass(reference, self.kind(), message).with_observed(observed)
        }
    }
}
