//! Constraint checks.
//!
//! This module handles:
//! - Range: numeric values within inclusive bounds
//! - Enumeration: values drawn from a named set
//!
//! Nulls are ignored by both; null handling belongs to the mandatory check.

use crate::{CheckContext, ColumnChecker, DataSource, access_error, sample_list};
use async_trait::async_trait;
use feedcheck_core::{CheckKind, CheckOutcome, ValidationRule};

/// Inclusive numeric bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeChecker;

#[async_trait]
impl ColumnChecker for RangeChecker {
    fn kind(&self) -> CheckKind {
        CheckKind::Range
    }

    async fn check(
        &self,
        rule: &ValidationRule,
        source: &dyn DataSource,
        ctx: &CheckContext,
    ) -> CheckOutcome {
        let reference = rule.reference();
        let Some((bottom, top)) = rule.range() else {
            return CheckOutcome::skipped(
                reference,
                self.kind(),
                "range needs both a bottom and a top bound",
            );
        };

        let values = match ctx.values(source, rule).await {
            Ok(values) => values,
            Err(err) => return access_error(reference, self.kind(), &err),
        };

        let mut outside = Vec::new();
        let mut non_numeric = Vec::new();
        for value in values.iter().filter(|v| !v.is_null()) {
            match value.as_number() {
                Some(n) if n < bottom || n > top => outside.push(value.to_string()),
                Some(_) => {}
                None => non_numeric.push(value.to_string()),
            }
        }

        let limit = ctx.config().sample_size;
        if !non_numeric.is_empty() {
            return CheckOutcome::error(
                reference,
                self.kind(),
                format!(
                    "{} non-numeric value(s): {}",
                    non_numeric.len(),
                    sample_list(&non_numeric, limit)
                ),
            )
            .with_observed(non_numeric.into_iter().take(limit));
        }

        if outside.is_empty() {
            CheckOutcome::pass(
                reference,
                self.kind(),
                format!("all values within [{bottom}, {top}]"),
            )
        } else {
            CheckOutcome::fail(
                reference,
                self.kind(),
                format!(
                    "{} value(s) outside [{bottom}, {top}]: {}",
                    outside.len(),
                    sample_list(&outside, limit)
                ),
            )
            .with_observed(outside.into_iter().take(limit))
        }
    }
}

/// Membership in a named enumeration.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumerationChecker;

#[async_trait]
impl ColumnChecker for EnumerationChecker {
    fn kind(&self) -> CheckKind {
        CheckKind::Enumeration
    }

    async fn check(
        &self,
        rule: &ValidationRule,
        source: &dyn DataSource,
        ctx: &CheckContext,
    ) -> CheckOutcome {
        let reference = rule.reference();
        let set = rule
            .enumeration_name
            .as_deref()
            .and_then(|name| ctx.enumerations().get(name));
        let Some(set) = set else {
            let name = rule
                .enumeration_name
                .as_deref()
                .or(rule.unresolved_enumeration.as_deref())
                .unwrap_or_default();
            return CheckOutcome::error(
                reference,
                self.kind(),
                format!("enumeration '{name}' is not defined"),
            );
        };

        let values = match ctx.values(source, rule).await {
            Ok(values) => values,
            Err(err) => return access_error(reference, self.kind(), &err),
        };

        let case_sensitive = ctx.config().enumeration_case_sensitive;
        let invalid: Vec<String> = values
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| v.to_string())
            .filter(|v| !set.contains(v, case_sensitive))
            .collect();

        let limit = ctx.config().sample_size;
        if invalid.is_empty() {
            CheckOutcome::pass(
                reference,
                self.kind(),
                format!("all values in enumeration '{}'", set.name),
            )
        } else {
            CheckOutcome::fail(
                reference,
                self.kind(),
                format!(
                    "{} value(s) not in enumeration '{}': {}",
                    invalid.len(),
                    set.name,
                    sample_list(&invalid, limit)
                ),
            )
            .with_observed(invalid.into_iter().take(limit))
        }
    }
}
