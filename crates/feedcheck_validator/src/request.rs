//! Insert/Append load behaviour.
//!
//! Both modes are measured against the watermark the data source exposes for
//! the table target. `Insert` needs at least one row more than the watermark.
//! `Append` must never lose rows and must have grown since the previous run.
//! Without a watermark there is nothing to compare, so the check is skipped.

use crate::{CheckContext, DataSource, QuerySpec, TableChecker, access_error, table_filter, table_reference};
use async_trait::async_trait;
use feedcheck_core::{CheckKind, CheckOutcome, RequestMode, TableTarget, ValidationRule};
use std::sync::Arc;
use tracing::warn;

/// Verifies that a table was loaded the way its metadata declares.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestModeChecker;

#[async_trait]
impl TableChecker for RequestModeChecker {
    fn kind(&self) -> CheckKind {
        CheckKind::RequestMode
    }

    async fn check(
        &self,
        target: &TableTarget,
        rules: &[Arc<ValidationRule>],
        source: &dyn DataSource,
        ctx: &CheckContext,
    ) -> CheckOutcome {
        let reference = table_reference(target, rules);
        let mut modes = rules.iter().filter_map(|r| r.request_mode);
        let Some(mode) = modes.next() else {
            return CheckOutcome::skipped(reference, self.kind(), "no request mode declared");
        };
        if modes.any(|other| other != mode) {
            warn!(target = %reference, %mode, "Conflicting request modes, using the first one");
        }

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
        let watermark = match ctx.watermark(source, target).await {
            Ok(watermark) => watermark,
            Err(err) => return access_error(reference, self.kind(), &err),
        };
        let Some(watermark) = watermark else {
            return CheckOutcome::skipped(
                reference,
                self.kind(),
                format!("no watermark recorded for {mode} table"),
            )
            .with_observed([count.to_string()]);
        };

        let previous = watermark.row_count;
        let outcome = match mode {
            RequestMode::Append if count < previous => CheckOutcome::fail(
                reference,
                self.kind(),
                format!("Append table shrank from {previous} to {count} row(s)"),
            ),
            RequestMode::Append if count == previous => CheckOutcome::fail(
                reference,
                self.kind(),
                format!("no rows appended since last run ({count} row(s))"),
            ),
            RequestMode::Append => CheckOutcome::pass(
                reference,
                self.kind(),
                format!("{} row(s) appended since last run", count - previous),
            ),
            RequestMode::Insert if count > previous => CheckOutcome::pass(
                reference,
                self.kind(),
                format!("{} new row(s) since last run", count - previous),
            ),
            RequestMode::Insert => CheckOutcome::fail(
                reference,
                self.kind(),
                format!("no new rows inserted since last run ({previous} then {count} row(s))"),
            ),
        };
        outcome.with_observed([previous.to_string(), count.to_string()])
    }
}
