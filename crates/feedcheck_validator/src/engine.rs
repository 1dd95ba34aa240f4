//! Main validation engine.
//!
//! The engine turns a catalog and a selection into independent checks and
//! runs them on a bounded worker pool. Every check records exactly one
//! outcome into a shared [`ResultAggregator`]; a run that is cancelled still
//! returns whatever completed before the cancellation.

use crate::{
    CheckContext, ColumnChecker, DataSource, FeedFileChecker, FeedFileSpec, JobSpec,
    JobStatusChecker, LogFileChecker, LogFileSpec, TableChecker, default_column_checkers,
    default_table_checkers,
};
use feedcheck_core::{
    CheckKind, CheckOutcome, EngineConfig, EngineError, ResultAggregator, RuleCatalog, RuleRef,
    Selection, TableTarget, ValidationRule, ValidationSummary,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// One unit of work scheduled on the pool.
enum PlannedCheck {
    Column {
        checker: Arc<dyn ColumnChecker>,
        rule: Arc<ValidationRule>,
    },
    Table {
        checker: Arc<dyn TableChecker>,
        target: TableTarget,
        rules: Arc<Vec<Arc<ValidationRule>>>,
    },
    FeedFile {
        checker: Arc<FeedFileChecker>,
        spec: FeedFileSpec,
    },
    LogFile {
        checker: Arc<LogFileChecker>,
        spec: LogFileSpec,
    },
    Job {
        checker: Arc<JobStatusChecker>,
        spec: JobSpec,
    },
}

impl PlannedCheck {
    fn kind(&self) -> CheckKind {
        match self {
            PlannedCheck::Column { checker, .. } => checker.kind(),
            PlannedCheck::Table { checker, .. } => checker.kind(),
            PlannedCheck::FeedFile { .. } => CheckKind::FeedFile,
            PlannedCheck::LogFile { .. } => CheckKind::LogFile,
            PlannedCheck::Job { .. } => CheckKind::JobStatus,
        }
    }

    fn reference(&self) -> RuleRef {
        match self {
            PlannedCheck::Column { rule, .. } => rule.reference(),
            PlannedCheck::Table { target, rules, .. } => crate::table_reference(target, rules),
            PlannedCheck::FeedFile { spec, .. } => spec.reference(),
            PlannedCheck::LogFile { spec, .. } => spec.reference(),
            PlannedCheck::Job { spec, .. } => spec.reference(),
        }
    }

    async fn execute(self, source: &dyn DataSource, ctx: &CheckContext) -> CheckOutcome {
        match self {
            PlannedCheck::Column { checker, rule } => checker.check(&rule, source, ctx).await,
            PlannedCheck::Table {
                checker,
                target,
                rules,
            } => checker.check(&target, &rules, source, ctx).await,
            PlannedCheck::FeedFile { checker, spec } => checker.check(&spec, ctx).await,
            PlannedCheck::LogFile { checker, spec } => checker.check(&spec, ctx).await,
            PlannedCheck::Job { checker, spec } => checker.check(&spec, ctx).await,
        }
    }
}

/// Concurrent rule engine.
///
/// # Example
///
/// ```rust
/// use feedcheck_core::{EngineConfig, EnumerationCatalog, RuleBuilder, RuleCatalog, Selection};
/// use feedcheck_validator::{InMemorySource, MemoryTable, ValidationEngine};
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let rule = RuleBuilder::new("CUSTOMER_FEED", "server1", "CUSTOMER_STG", "AGE")
///     .data_type("INTEGER")
///     .range(0.0, 120.0)
///     .build();
/// let catalog = RuleCatalog::new(vec![rule], EnumerationCatalog::new()).unwrap();
/// let source = InMemorySource::new().with_table(
///     "server1",
///     "CUSTOMER_STG",
///     MemoryTable::new().with_column("AGE", "Int64", [25_i64, 40]),
/// );
///
/// let engine = ValidationEngine::new(EngineConfig::default()).unwrap();
/// let summary = engine.run(&catalog, &Selection::all(), Arc::new(source)).await;
///
/// for outcome in &summary.outcomes {
///     println!("{} {} {}", outcome.status, outcome.kind, outcome.message);
/// }
/// # });
/// ```
pub struct ValidationEngine {
    config: Arc<EngineConfig>,
    column_checkers: Vec<Arc<dyn ColumnChecker>>,
    table_checkers: Vec<Arc<dyn TableChecker>>,
    feed_files: Option<Arc<FeedFileChecker>>,
    log_files: Option<Arc<LogFileChecker>>,
    jobs: Option<Arc<JobStatusChecker>>,
}

impl ValidationEngine {
    /// Creates an engine with the default checkers.
    ///
    /// Fails when the configuration is out of range.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.check()?;
        Ok(Self {
            config: Arc::new(config),
            column_checkers: default_column_checkers(),
            table_checkers: default_table_checkers(),
            feed_files: None,
            log_files: None,
            jobs: None,
        })
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Adds a column checker, replacing any registered for the same kind.
    pub fn with_column_checker(mut self, checker: Arc<dyn ColumnChecker>) -> Self {
        self.column_checkers.retain(|c| c.kind() != checker.kind());
        self.column_checkers.push(checker);
        self
    }

    /// Adds a table checker, replacing any registered for the same kind.
    pub fn with_table_checker(mut self, checker: Arc<dyn TableChecker>) -> Self {
        self.table_checkers.retain(|c| c.kind() != checker.kind());
        self.table_checkers.push(checker);
        self
    }

    /// Enables feed file checks.
    pub fn with_feed_files(mut self, checker: FeedFileChecker) -> Self {
        self.feed_files = Some(Arc::new(checker));
        self
    }

    /// Enables job log file checks.
    pub fn with_log_files(mut self, checker: LogFileChecker) -> Self {
        self.log_files = Some(Arc::new(checker));
        self
    }

    /// Enables job status checks.
    pub fn with_jobs(mut self, checker: JobStatusChecker) -> Self {
        self.jobs = Some(Arc::new(checker));
        self
    }

    /// Expands the selected rules into individual checks.
    ///
    /// File and job checks are not tied to a database, so they only run when
    /// the selection does not restrict databases.
    fn plan(&self, rules: &[Arc<ValidationRule>], selection: &Selection) -> Vec<PlannedCheck> {
        let mut planned = Vec::new();

        for rule in rules {
            for checker in &self.column_checkers {
                if selection.allows_kind(checker.kind()) && checker.applies_to(rule) {
                    planned.push(PlannedCheck::Column {
                        checker: Arc::clone(checker),
                        rule: Arc::clone(rule),
                    });
                }
            }
        }

        for (target, group) in RuleCatalog::group_by_target(rules) {
            let group = Arc::new(group);
            for checker in &self.table_checkers {
                if selection.allows_kind(checker.kind()) && checker.applies_to(&group) {
                    planned.push(PlannedCheck::Table {
                        checker: Arc::clone(checker),
                        target: target.clone(),
                        rules: Arc::clone(&group),
                    });
                }
            }
        }

        if !selection.databases.is_empty() {
            return planned;
        }

        if let Some(checker) = &self.feed_files {
            if selection.allows_kind(CheckKind::FeedFile) {
                for spec in checker.feeds() {
                    if selection.allows_feed(&spec.feed) {
                        planned.push(PlannedCheck::FeedFile {
                            checker: Arc::clone(checker),
                            spec: spec.clone(),
                        });
                    }
                }
            }
        }

        if let Some(checker) = &self.log_files {
            if selection.allows_kind(CheckKind::LogFile) {
                for spec in checker.logs() {
                    let allowed = match &spec.feed {
                        Some(feed) => selection.allows_feed(feed),
                        None => selection.feeds.is_empty(),
                    };
                    if allowed {
                        planned.push(PlannedCheck::LogFile {
                            checker: Arc::clone(checker),
                            spec: spec.clone(),
                        });
                    }
                }
            }
        }

        if let Some(checker) = &self.jobs {
            if selection.allows_kind(CheckKind::JobStatus) {
                for spec in checker.jobs() {
                    let allowed = match &spec.feed {
                        Some(feed) => selection.allows_feed(feed),
                        None => selection.feeds.is_empty(),
                    };
                    if allowed {
                        planned.push(PlannedCheck::Job {
                            checker: Arc::clone(checker),
                            spec: spec.clone(),
                        });
                    }
                }
            }
        }

        planned
    }

    /// Runs every selected check to completion.
    pub async fn run(
        &self,
        catalog: &RuleCatalog,
        selection: &Selection,
        source: Arc<dyn DataSource>,
    ) -> ValidationSummary {
        self.run_until(catalog, selection, source, std::future::pending())
            .await
    }

    /// Runs the selected checks until they finish or `cancel` resolves.
    ///
    /// On cancellation in-flight checks are abandoned; the summary holds the
    /// outcomes recorded so far and is flagged as cancelled.
    pub async fn run_until<C>(
        &self,
        catalog: &RuleCatalog,
        selection: &Selection,
        source: Arc<dyn DataSource>,
        cancel: C,
    ) -> ValidationSummary
    where
        C: Future<Output = ()>,
    {
        let rules = catalog.select(selection);
        let planned = self.plan(&rules, selection);
        info!(
            rules = rules.len(),
            checks = planned.len(),
            workers = self.config.max_workers,
            source = %source.description(),
            "Starting validation run"
        );

        let ctx = CheckContext::new(Arc::clone(&self.config), catalog.enumerations());
        let aggregator = Arc::new(ResultAggregator::new());
        let workers = Arc::new(Semaphore::new(self.config.max_workers));

        let mut tasks = JoinSet::new();
        let mut pending: HashMap<tokio::task::Id, (RuleRef, CheckKind)> = HashMap::new();
        for check in planned {
            let identity = (check.reference(), check.kind());
            let workers = Arc::clone(&workers);
            let aggregator = Arc::clone(&aggregator);
            let source = Arc::clone(&source);
            let ctx = ctx.clone();

            let handle = tasks.spawn(async move {
                let Ok(_permit) = workers.acquire_owned().await else {
                    return;
                };
                let outcome = check.execute(source.as_ref(), &ctx).await;
                aggregator.record(outcome);
            });
            pending.insert(handle.id(), identity);
        }

        tokio::pin!(cancel);
        loop {
            tokio::select! {
                biased;
                _ = &mut cancel => {
                    warn!(
                        completed = aggregator.len(),
                        abandoned = tasks.len(),
                        "Validation run cancelled"
                    );
                    tasks.abort_all();
                    aggregator.mark_cancelled();
                    break;
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok(())) => {}
                    Some(Err(err)) if err.is_panic() => {
                        if let Some((reference, kind)) = pending.remove(&err.id()) {
                            error!(rule = %reference, %kind, "Check panicked");
                            aggregator.record(CheckOutcome::error(reference, kind, "check panicked"));
                        }
                    }
                    Some(Err(_)) => {}
                },
            }
        }

        let summary = aggregator.snapshot();
        info!(
            status = %summary.status,
            pass = summary.overall.pass,
            fail = summary.overall.fail,
            error = summary.overall.error,
            skipped = summary.overall.skipped,
            cancelled = summary.cancelled,
            "Validation run finished"
        );
        summary
    }
}

impl std::fmt::Debug for ValidationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationEngine")
            .field("config", &self.config)
            .field(
                "column_checkers",
                &self.column_checkers.iter().map(|c| c.kind()).collect::<Vec<_>>(),
            )
            .field(
                "table_checkers",
                &self.table_checkers.iter().map(|c| c.kind()).collect::<Vec<_>>(),
            )
            .field("feed_files", &self.feed_files)
            .field("log_files", &self.log_files)
            .field("jobs", &self.jobs)
            .finish()
    }
}
