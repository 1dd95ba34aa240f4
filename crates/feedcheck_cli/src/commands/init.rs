use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::output;

const SAMPLE_METADATA: &str = r#"Feed_to_staging:
  - Modules: CUSTOMER_MODULE
    Feed: CUSTOMER_FEED
    FieldName: CUSTOMER_ID
    DBName: server1
    DB Table: CUSTOMER_STG
    DataType: INTEGER
    Nullable: N
    Mandatory: Y
    Unique: Y
    Request: Insert
    ExpectedCount: 3
  - Modules: CUSTOMER_MODULE
    Feed: CUSTOMER_FEED
    FieldName: STATUS
    DBName: server1
    DB Table: CUSTOMER_STG
    DataType: VARCHAR
    Nullable: N
    Enumeration: CUSTOMER_STATUS
  - Modules: CUSTOMER_MODULE
    Feed: CUSTOMER_FEED
    FieldName: AGE
    DBName: server1
    DB Table: CUSTOMER_STG
    DataType: INTEGER
    Nullable: Y
    RangeBottom: 0
    RangeTop: 120
Enumeration:
  - EnumerationName: CUSTOMER_STATUS
    EnumValues: ACTIVE
  - EnumerationName: CUSTOMER_STATUS
    EnumValues: CLOSED
"#;

const SAMPLE_DATA: &str = "CUSTOMER_ID,STATUS,AGE
1,ACTIVE,34
2,CLOSED,58
3,ACTIVE,41
";

const SAMPLE_CONFIG: &str = r#"[engine]
max_workers = 4
query_timeout_ms = 30000
sample_size = 10

[[tables]]
database = "server1"
table = "CUSTOMER_STG"
path = "data/customer_stg.csv"

[paths]
metadata_file = "metadata.yml"
feed_base_path = "feeds"
log_base_path = "logs"
watermark_file = "state/watermarks.json"

[jobs]
mock_mode = true
names = ["FEED_LOAD_JOB"]

[[feed_files]]
feed = "CUSTOMER_FEED"
pattern = "CUSTOMER_FEED_*.csv"

[[log_files]]
job = "FEED_LOAD_JOB"
log_type = "info"
"#;

const SAMPLE_LOG: &str = "INFO FEED_LOAD_JOB loaded 3 row(s) into CUSTOMER_STG
";

/// Files written by `init`, relative to the target directory.
const FILES: [(&str, &str); 5] = [
    ("metadata.yml", SAMPLE_METADATA),
    ("feedcheck.toml", SAMPLE_CONFIG),
    ("data/customer_stg.csv", SAMPLE_DATA),
    ("feeds/CUSTOMER_FEED/CUSTOMER_FEED_sample.csv", SAMPLE_DATA),
    ("logs/FEED_LOAD_JOB/FEED_LOAD_JOB_sample_info.log", SAMPLE_LOG),
];

pub fn execute(directory: &str, force: bool) -> Result<()> {
    let root = Path::new(directory);
    info!("Initializing sample project in {}", root.display());

    if !force {
        if let Some((existing, _)) = FILES.iter().find(|(name, _)| root.join(name).exists()) {
            bail!(
                "File already exists: {} (use --force to overwrite)",
                root.join(existing).display()
            );
        }
    }

    for (name, content) in FILES {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(&path, content)
            .with_context(|| format!("Failed to write file: {}", path.display()))?;
        output::print_success(&format!("Wrote {}", path.display()));
    }

    output::print_info(&format!(
        "Run `feedcheck validate --config {}` to validate the sample data",
        root.join("feedcheck.toml").display()
    ));
    Ok(())
}
