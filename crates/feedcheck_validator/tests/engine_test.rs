//! End-to-end runs of the validation engine against in-memory and SQL tables.

use feedcheck_core::{
    CheckKind, EngineConfig, EnumerationCatalog, EnumerationSet, OutcomeStatus, RequestMode,
    RuleBuilder, RuleCatalog, RunStatus, Selection, TableTarget, ValidationRule,
};
use feedcheck_validator::{
    DataSource, InMemorySource, JobSpec, JobStatusChecker, LogFileChecker, LogFileSpec,
    MemoryTable, MemoryWatermarkStore, MockJobProvider, SqlSource, ValidationEngine, Watermark,
    WatermarkStore,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn customer_rules() -> Vec<ValidationRule> {
    vec![
        RuleBuilder::new("CUSTOMER_FEED", "server1", "CUSTOMER_STG", "CUSTOMER_ID")
            .data_type("INTEGER")
            .unique(true)
            .build(),
        RuleBuilder::new("CUSTOMER_FEED", "server1", "CUSTOMER_STG", "AGE")
            .data_type("INTEGER")
            .mandatory(true)
            .range(0.0, 120.0)
            .build(),
        RuleBuilder::new("CUSTOMER_FEED", "server1", "CUSTOMER_STG", "STATUS")
            .data_type("VARCHAR")
            .enumeration("CUSTOMER_STATUS")
            .build(),
    ]
}

fn enumerations() -> EnumerationCatalog {
    let mut catalog = EnumerationCatalog::new();
    catalog.insert(EnumerationSet::new("CUSTOMER_STATUS", ["ACTIVE", "CLOSED"]));
    catalog
}

fn customers() -> MemoryTable {
    MemoryTable::new()
        .with_column("CUSTOMER_ID", "Int64", [1_i64, 2, 2, 3])
        .with_column("AGE", "Int64", [Some(25_i64), Some(130), None, Some(40)])
        .with_column("STATUS", "Utf8", ["ACTIVE", "CLOSED", "ACTIVE", "PENDING"])
}

fn outcome_for<'a>(
    summary: &'a feedcheck_core::ValidationSummary,
    field: &str,
    kind: CheckKind,
) -> &'a feedcheck_core::CheckOutcome {
    summary
        .outcomes
        .iter()
        .find(|o| o.kind == kind && o.rule.field.as_deref() == Some(field))
        .unwrap_or_else(|| panic!("no {kind} outcome for {field}"))
}

#[tokio::test]
async fn test_customer_table_findings() {
    let catalog = RuleCatalog::new(customer_rules(), enumerations()).unwrap();
    let source = InMemorySource::new().with_table("server1", "CUSTOMER_STG", customers());

    let engine = ValidationEngine::new(EngineConfig::default()).unwrap();
    let summary = engine
        .run(&catalog, &Selection::all(), Arc::new(source))
        .await;

    assert_eq!(summary.status, RunStatus::Fail);
    assert!(!summary.cancelled);

    let mandatory = outcome_for(&summary, "AGE", CheckKind::Mandatory);
    assert_eq!(mandatory.status, OutcomeStatus::Fail);
    assert_eq!(mandatory.message, "1 null value(s)");

    let range = outcome_for(&summary, "AGE", CheckKind::Range);
    assert_eq!(range.status, OutcomeStatus::Fail);
    assert!(range.message.contains("130"), "{}", range.message);

    let unique = outcome_for(&summary, "CUSTOMER_ID", CheckKind::Unique);
    assert_eq!(unique.status, OutcomeStatus::Fail);
    assert!(unique.message.contains('2'), "{}", unique.message);

    let enumeration = outcome_for(&summary, "STATUS", CheckKind::Enumeration);
    assert_eq!(enumeration.status, OutcomeStatus::Fail);
    assert!(enumeration.message.contains("PENDING"));

    let data_type = outcome_for(&summary, "AGE", CheckKind::DataType);
    assert_eq!(data_type.status, OutcomeStatus::Pass);

    let row_counts: Vec<_> = summary.outcomes_of(CheckKind::RowCount).collect();
    assert_eq!(row_counts.len(), 1);
    assert_eq!(row_counts[0].status, OutcomeStatus::Skipped);
    assert_eq!(row_counts[0].rule.field, None);

    let feed_counts = &summary.by_feed["CUSTOMER_FEED"];
    assert_eq!(feed_counts.total(), summary.overall.total());
}

#[tokio::test]
async fn test_slow_column_times_out_alone() {
    let catalog = RuleCatalog::new(customer_rules(), enumerations()).unwrap();
    let source = InMemorySource::new()
        .with_table("server1", "CUSTOMER_STG", customers())
        .with_column_latency("server1", "CUSTOMER_STG", "AGE", Duration::from_secs(5));

    let config = EngineConfig::default().with_query_timeout(Duration::from_millis(100));
    let engine = ValidationEngine::new(config).unwrap();
    let selection = Selection::all().with_kinds([
        CheckKind::DataType,
        CheckKind::Mandatory,
        CheckKind::Unique,
        CheckKind::Range,
    ]);
    let summary = engine.run(&catalog, &selection, Arc::new(source)).await;

    for outcome in &summary.outcomes {
        if outcome.rule.field.as_deref() == Some("AGE") {
            assert_eq!(outcome.status, OutcomeStatus::Error, "{outcome:?}");
            assert!(outcome.message.contains("timed out"), "{}", outcome.message);
        } else {
            assert_ne!(outcome.status, OutcomeStatus::Error, "{outcome:?}");
        }
    }
    assert_eq!(
        outcome_for(&summary, "CUSTOMER_ID", CheckKind::DataType).status,
        OutcomeStatus::Pass
    );
}

#[tokio::test]
async fn test_selection_by_feed() {
    let mut rules = customer_rules();
    rules.push(
        RuleBuilder::new("TXN_FEED", "server1", "TXN_STG", "TXN_ID")
            .data_type("INTEGER")
            .build(),
    );
    let catalog = RuleCatalog::new(rules, enumerations()).unwrap();
    let source = InMemorySource::new()
        .with_table("server1", "CUSTOMER_STG", customers())
        .with_table(
            "server1",
            "TXN_STG",
            MemoryTable::new().with_column("TXN_ID", "Int64", [10_i64, 11]),
        );

    let engine = ValidationEngine::new(EngineConfig::default()).unwrap();
    let selection = Selection::all().with_feeds(["TXN_FEED"]);
    let summary = engine.run(&catalog, &selection, Arc::new(source)).await;

    assert!(summary.outcomes.iter().all(|o| o.rule.feed == "TXN_FEED"));
    assert_eq!(summary.by_feed.keys().collect::<Vec<_>>(), vec!["TXN_FEED"]);
    assert_eq!(summary.status, RunStatus::Pass);
}

#[tokio::test]
async fn test_cancellation_keeps_completed_outcomes() {
    let rules = vec![
        RuleBuilder::new("FAST_FEED", "server1", "FAST_STG", "ID")
            .data_type("INTEGER")
            .build(),
        RuleBuilder::new("SLOW_FEED", "server1", "SLOW_STG", "ID")
            .data_type("INTEGER")
            .build(),
    ];
    let catalog = RuleCatalog::new(rules, EnumerationCatalog::new()).unwrap();
    let table = MemoryTable::new().with_column("ID", "Int64", [1_i64, 2]);
    let source = InMemorySource::new()
        .with_table("server1", "FAST_STG", table.clone())
        .with_table("server1", "SLOW_STG", table)
        .with_latency("server1", "SLOW_STG", Duration::from_secs(30));

    let engine = ValidationEngine::new(EngineConfig::default().with_max_workers(16)).unwrap();
    let summary = engine
        .run_until(
            &catalog,
            &Selection::all(),
            Arc::new(source),
            tokio::time::sleep(Duration::from_millis(300)),
        )
        .await;

    assert!(summary.cancelled);
    assert!(!summary.outcomes.is_empty());
    assert!(summary.outcomes.iter().all(|o| o.rule.feed == "FAST_FEED"));
}

#[tokio::test]
async fn test_jobs_run_alongside_rules() {
    let catalog = RuleCatalog::new(customer_rules(), enumerations()).unwrap();
    let source = InMemorySource::new().with_table("server1", "CUSTOMER_STG", customers());
    let jobs = JobStatusChecker::new(
        Arc::new(MockJobProvider::new()),
        vec![
            JobSpec {
                feed: Some("CUSTOMER_FEED".into()),
                ..JobSpec::new("FEED_LOAD_JOB")
            },
            JobSpec::new("FAILED_JOB"),
        ],
    );

    let engine = ValidationEngine::new(EngineConfig::default())
        .unwrap()
        .with_jobs(jobs);

    let selection = Selection::all().with_feeds(["CUSTOMER_FEED"]);
    let summary = engine.run(&catalog, &selection, Arc::new(source.clone())).await;
    let jobs: Vec<_> = summary.outcomes_of(CheckKind::JobStatus).collect();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].rule.table, "FEED_LOAD_JOB");
    assert_eq!(jobs[0].status, OutcomeStatus::Pass);

    let summary = engine
        .run(
            &catalog,
            &Selection::all().with_kinds([CheckKind::JobStatus]),
            Arc::new(source),
        )
        .await;
    assert_eq!(summary.overall.total(), 2);
    assert_eq!(summary.overall.fail, 1);
    assert_eq!(summary.by_database["scheduler"].total(), 2);
}

#[tokio::test]
async fn test_log_files_follow_feed_selection() {
    let logs = tempfile::tempdir().unwrap();
    let job_dir = logs.path().join("FEED_LOAD_JOB");
    std::fs::create_dir_all(&job_dir).unwrap();
    std::fs::write(job_dir.join("FEED_LOAD_JOB_error.log"), "ORA-00942\n").unwrap();

    let catalog = RuleCatalog::new(customer_rules(), enumerations()).unwrap();
    let source = InMemorySource::new().with_table("server1", "CUSTOMER_STG", customers());
    let checker = LogFileChecker::new(
        logs.path(),
        vec![
            LogFileSpec {
                feed: Some("CUSTOMER_FEED".into()),
                log_type: Some("error".into()),
                ..LogFileSpec::new("FEED_LOAD_JOB")
            },
            LogFileSpec::new("DATA_VALIDATION_JOB"),
        ],
    );
    let engine = ValidationEngine::new(EngineConfig::default())
        .unwrap()
        .with_log_files(checker);

    let summary = engine
        .run(
            &catalog,
            &Selection::all().with_kinds([CheckKind::LogFile]),
            Arc::new(source.clone()),
        )
        .await;
    assert_eq!(summary.overall.total(), 2);
    assert_eq!(summary.overall.pass, 1);
    assert_eq!(summary.by_database["logs"].fail, 1);

    let selection = Selection::all().with_feeds(["CUSTOMER_FEED"]);
    let summary = engine.run(&catalog, &selection, Arc::new(source)).await;
    let logs: Vec<_> = summary.outcomes_of(CheckKind::LogFile).collect();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, OutcomeStatus::Pass);
}

#[tokio::test]
async fn test_sql_source_over_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("customers.csv");
    std::fs::write(
        &path,
        "CUSTOMER_ID,STATUS,AGE\n1,ACTIVE,25\n2,CLOSED,\n3,ACTIVE,130\n",
    )
    .unwrap();

    let source = SqlSource::new();
    source
        .register_csv("server1", "CUSTOMER_STG", &path)
        .await
        .unwrap();
    let source: Arc<dyn DataSource> = Arc::new(source);

    let rules = vec![
        RuleBuilder::new("CUSTOMER_FEED", "server1", "CUSTOMER_STG", "CUSTOMER_ID")
            .data_type("INTEGER")
            .unique(true)
            .build(),
        RuleBuilder::new("CUSTOMER_FEED", "server1", "CUSTOMER_STG", "AGE")
            .data_type("INTEGER")
            .range(0.0, 120.0)
            .build(),
    ];
    let catalog = RuleCatalog::new(rules, EnumerationCatalog::new()).unwrap();
    let engine = ValidationEngine::new(EngineConfig::default()).unwrap();
    let summary = engine.run(&catalog, &Selection::all(), source).await;

    assert_eq!(
        outcome_for(&summary, "CUSTOMER_ID", CheckKind::Unique).status,
        OutcomeStatus::Pass
    );
    assert_eq!(
        outcome_for(&summary, "AGE", CheckKind::Mandatory).message,
        "1 null value(s)"
    );
    let range = outcome_for(&summary, "AGE", CheckKind::Range);
    assert_eq!(range.status, OutcomeStatus::Fail);
    assert!(range.message.contains("130"));
}

#[tokio::test]
async fn test_workbook_to_summary() {
    let yaml = r#"
Feed_to_staging:
  - Modules: CUSTOMER_MODULE
    Feed: CUSTOMER_FEED
    FieldName: STATUS
    DBName: server1
    DB Table: CUSTOMER_STG
    DataType: VARCHAR
    Nullable: Y
    Enumeration: CUSTOMER_STATUS
  - Modules: CUSTOMER_MODULE
    Feed: CUSTOMER_FEED
    FieldName: REGION
    DBName: server1
    DB Table: CUSTOMER_STG
    DataType: VARCHAR
    Nullable: Y
    Enumeration: REGIONS
Enumeration:
  - EnumerationName: CUSTOMER_STATUS
    EnumValues: ACTIVE
  - EnumerationName: CUSTOMER_STATUS
    EnumValues: CLOSED
"#;
    let workbook = feedcheck_parser::parse_yaml(yaml).unwrap();
    let loaded = feedcheck_parser::load_catalog(&workbook, &EngineConfig::default()).unwrap();
    assert_eq!(loaded.unresolved.len(), 1);

    let source = InMemorySource::new().with_table(
        "server1",
        "CUSTOMER_STG",
        MemoryTable::new()
            .with_column("STATUS", "Utf8", ["ACTIVE", "CLOSED"])
            .with_column("REGION", "Utf8", ["EU", "US"]),
    );
    let engine = ValidationEngine::new(EngineConfig::default()).unwrap();
    let summary = engine
        .run(
            &loaded.catalog,
            &Selection::all().with_kinds([CheckKind::Enumeration]),
            Arc::new(source),
        )
        .await;

    assert_eq!(
        outcome_for(&summary, "STATUS", CheckKind::Enumeration).status,
        OutcomeStatus::Pass
    );
    let region = outcome_for(&summary, "REGION", CheckKind::Enumeration);
    assert_eq!(region.status, OutcomeStatus::Error);
    assert_eq!(region.message, "enumeration 'REGIONS' is not defined");
    assert_eq!(summary.status, RunStatus::Error);
}

#[tokio::test]
async fn test_feeds_sharing_a_table_use_their_own_watermarks() {
    let rule = |feed: &str, region: &str| {
        RuleBuilder::new(feed, "server2", "TXN_STG", "TXN_ID")
            .request_mode(RequestMode::Append)
            .where_clause(format!("REGION = '{region}'"))
            .build()
    };
    let catalog = RuleCatalog::new(
        vec![rule("EU_FEED", "EU"), rule("US_FEED", "US")],
        EnumerationCatalog::new(),
    )
    .unwrap();

    let store = Arc::new(MemoryWatermarkStore::new());
    for (feed, previous) in [("EU_FEED", 2), ("US_FEED", 2)] {
        let target = TableTarget {
            database: "server2".into(),
            table: "TXN_STG".into(),
            feed: feed.into(),
        };
        store.put(&target, Watermark::now(previous)).unwrap();
    }
    let source = InMemorySource::new()
        .with_table(
            "server2",
            "TXN_STG",
            MemoryTable::new()
                .with_column("TXN_ID", "Int64", [1_i64, 2, 3, 4, 5])
                .with_column("REGION", "Utf8", ["EU", "EU", "US", "EU", "US"]),
        )
        .with_watermarks(store);

    let engine = ValidationEngine::new(EngineConfig::default()).unwrap();
    let selection = Selection::all().with_kinds([CheckKind::RequestMode]);
    let summary = engine.run(&catalog, &selection, Arc::new(source)).await;

    let status_of = |feed: &str| {
        summary
            .outcomes
            .iter()
            .find(|o| o.rule.feed == feed)
            .map(|o| o.status)
    };
    assert_eq!(summary.overall.total(), 2);
    assert_eq!(status_of("EU_FEED"), Some(OutcomeStatus::Pass));
    assert_eq!(status_of("US_FEED"), Some(OutcomeStatus::Fail));
}
