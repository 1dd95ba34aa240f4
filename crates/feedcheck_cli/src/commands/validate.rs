use anyhow::{Context, Result, anyhow};
use feedcheck_core::{RuleCatalog, Selection};
use feedcheck_parser::{load_catalog, parse_file};
use feedcheck_validator::{
    AutorepProvider, CheckContext, DataSource, FeedFileChecker, JobStatusChecker,
    JobStatusProvider, JsonWatermarkStore, LogFileChecker, MockJobProvider, QuerySpec, SqlSource,
    ValidationEngine, Watermark, WatermarkStore, table_filter,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{self, RunConfig};
use crate::output;

pub struct ValidateArgs {
    pub metadata: Option<String>,
    pub config: Option<String>,
    pub feeds: Vec<String>,
    pub databases: Vec<String>,
    pub kinds: Vec<String>,
    pub format: String,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    let config = config::resolve(args.config.as_deref())?;
    let metadata = config.metadata_path(args.metadata.as_deref())?;
    let mut sink = output::sink(&args.format)?;
    let text = args.format == "text";
    info!("Validating metadata workbook: {}", metadata.display());

    let workbook = parse_file(&metadata)
        .with_context(|| format!("Failed to parse metadata workbook: {}", metadata.display()))?;
    let loaded = load_catalog(&workbook, &config.engine)
        .with_context(|| format!("Failed to load rules from {}", metadata.display()))?;

    if text {
        output::print_info(&format!(
            "Loaded {} rule(s) across {} feed(s); {} row(s) rejected",
            loaded.catalog.len(),
            loaded.catalog.feeds().len(),
            loaded.rejected.len()
        ));
    }
    if !loaded.unresolved.is_empty() {
        output::print_warning(&format!(
            "{} rule(s) reference an undefined enumeration",
            loaded.unresolved.len()
        ));
    }

    let selection = Selection::from_strings(args.feeds, args.databases, args.kinds)
        .map_err(|e| anyhow!("Invalid --kind value: {e}"))?;

    let watermarks = open_watermarks(&config)?;
    let source: Arc<dyn DataSource> = Arc::new(build_source(&config, watermarks.clone()).await?);
    let engine = build_engine(&config)?;

    let cancel = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        warn!("Interrupt received, cancelling validation run");
    };
    let summary = engine
        .run_until(&loaded.catalog, &selection, Arc::clone(&source), cancel)
        .await;

    output::report(sink.as_mut(), &summary).context("Failed to write validation report")?;

    if let Some(store) = &watermarks {
        if summary.cancelled {
            warn!("Run was cancelled, watermarks left unchanged");
        } else {
            record_watermarks(&config, &loaded.catalog, &selection, source.as_ref(), &**store)
                .await;
        }
    }

    if !summary.passed() || summary.cancelled {
        std::process::exit(1);
    }

    Ok(())
}

fn open_watermarks(config: &RunConfig) -> Result<Option<Arc<JsonWatermarkStore>>> {
    config
        .paths
        .watermark_file
        .as_ref()
        .map(|path| {
            JsonWatermarkStore::open(path)
                .map(Arc::new)
                .with_context(|| format!("Failed to open watermark file: {}", path.display()))
        })
        .transpose()
}

/// Registers every configured CSV table with a DataFusion session.
async fn build_source(
    config: &RunConfig,
    watermarks: Option<Arc<JsonWatermarkStore>>,
) -> Result<SqlSource> {
    let mut source = SqlSource::new();
    if let Some(store) = watermarks {
        source = source.with_watermarks(store);
    }

    if config.tables.is_empty() {
        warn!("No tables configured; data checks will report ERROR");
    }
    for table in &config.tables {
        source
            .register_csv(&table.database, &table.table, &table.path)
            .await
            .with_context(|| {
                format!(
                    "Failed to register {}.{} from {}",
                    table.database,
                    table.table,
                    table.path.display()
                )
            })?;
    }
    Ok(source)
}

fn build_engine(config: &RunConfig) -> Result<ValidationEngine> {
    let mut engine =
        ValidationEngine::new(config.engine.clone()).context("Invalid engine configuration")?;

    if !config.feed_files.is_empty() {
        let base = config
            .paths
            .feed_base_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        info!(base = %base.display(), feeds = config.feed_files.len(), "Feed file checks enabled");
        engine = engine.with_feed_files(FeedFileChecker::new(base, config.feed_files.clone()));
    }

    if !config.log_files.is_empty() {
        let base = config
            .paths
            .log_base_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("logs"));
        info!(base = %base.display(), jobs = config.log_files.len(), "Log file checks enabled");
        engine = engine.with_log_files(LogFileChecker::new(base, config.log_files.clone()));
    }

    if !config.jobs.names.is_empty() {
        let provider: Arc<dyn JobStatusProvider> = if config.jobs.mock_mode {
            Arc::new(MockJobProvider::new())
        } else {
            let mut autorep =
                AutorepProvider::new(config.jobs.autorep_path.clone(), config.jobs.timeout());
            if let Some(environment) = &config.jobs.environment {
                autorep = autorep.with_environment(environment.clone());
            }
            Arc::new(autorep)
        };
        info!(provider = %provider.description(), jobs = config.jobs.names.len(), "Job status checks enabled");
        engine = engine.with_jobs(JobStatusChecker::new(provider, config.jobs.specs()));
    }

    Ok(engine)
}

/// Stores the current row count of every selected Insert/Append target as
/// the baseline for the next run.
async fn record_watermarks(
    config: &RunConfig,
    catalog: &RuleCatalog,
    selection: &Selection,
    source: &dyn DataSource,
    store: &dyn WatermarkStore,
) {
    let ctx = CheckContext::new(Arc::new(config.engine.clone()), catalog.enumerations());
    let rules = catalog.select(selection);

    for (target, group) in RuleCatalog::group_by_target(&rules) {
        if group.iter().all(|r| r.request_mode.is_none()) {
            continue;
        }
        let query = QuerySpec::RowCount {
            filter: table_filter(&group),
        };
        let recorded = match ctx
            .count(source, &target.database, &target.table, query)
            .await
        {
            Ok(count) => store.put(&target, Watermark::now(count)),
            Err(err) => Err(err),
        };
        match recorded {
            Ok(()) => info!(
                database = %target.database,
                table = %target.table,
                feed = %target.feed,
                "Recorded watermark"
            ),
            Err(err) => warn!(
                database = %target.database,
                table = %target.table,
                error = %err,
                "Failed to record watermark"
            ),
        }
    }
}
