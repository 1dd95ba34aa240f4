//! Run configuration for the binary.
//!
//! Everything the engine needs besides the workbook: engine limits, where the
//! tables live, the feed landing area and the scheduler. Environment
//! variables override the file.

use anyhow::{Context, Result, anyhow};
use feedcheck_core::EngineConfig;
use feedcheck_validator::{FeedFileSpec, JobSpec, LogFileSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A CSV file exposed as `database.table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub database: String,
    pub table: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Metadata workbook used when none is given on the command line
    #[serde(default)]
    pub metadata_file: Option<PathBuf>,

    /// Directory holding one landing directory per feed
    #[serde(default)]
    pub feed_base_path: Option<PathBuf>,

    /// Directory holding one log directory per scheduler job
    #[serde(default)]
    pub log_base_path: Option<PathBuf>,

    /// JSON file holding Insert/Append watermarks
    #[serde(default)]
    pub watermark_file: Option<PathBuf>,
}

fn default_autorep() -> PathBuf {
    PathBuf::from("autorep")
}

fn default_job_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Answer from the built-in mock table instead of running autorep
    #[serde(default)]
    pub mock_mode: bool,

    #[serde(default = "default_autorep")]
    pub autorep_path: PathBuf,

    /// Scheduler instance (`AUTOSERV`)
    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default = "default_job_timeout_ms")]
    pub timeout_ms: u64,

    /// Jobs to check
    #[serde(default)]
    pub names: Vec<String>,

    /// Status every job is expected to report (default `SU`)
    #[serde(default)]
    pub expected_status: Option<String>,

    /// Poll every job until it finishes, for at most this long
    #[serde(default)]
    pub wait_for_completion: Option<String>,

    /// Delay between polls while waiting
    #[serde(default)]
    pub poll_interval: Option<String>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            mock_mode: false,
            autorep_path: default_autorep(),
            environment: None,
            timeout_ms: default_job_timeout_ms(),
            names: Vec::new(),
            expected_status: None,
            wait_for_completion: None,
            poll_interval: None,
        }
    }
}

impl JobsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn specs(&self) -> Vec<JobSpec> {
        self.names
            .iter()
            .map(|name| JobSpec {
                expected_status: self.expected_status.clone(),
                wait_for_completion: self.wait_for_completion.clone(),
                poll_interval: self.poll_interval.clone(),
                ..JobSpec::new(name.as_str())
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub tables: Vec<TableConfig>,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub feed_files: Vec<FeedFileSpec>,

    #[serde(default)]
    pub log_files: Vec<LogFileSpec>,
}

fn flag_value(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

impl RunConfig {
    /// Reads a configuration file, or the defaults when `path` is `None`.
    ///
    /// Relative table paths are resolved against the file's directory.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: RunConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.resolve_relative(base);
        }
        config
            .engine
            .check()
            .with_context(|| format!("Invalid engine settings in {}", path.display()))?;
        Ok(config)
    }

    fn resolve_relative(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for table in &mut self.tables {
            resolve(&mut table.path);
        }
        for path in [
            &mut self.paths.metadata_file,
            &mut self.paths.feed_base_path,
            &mut self.paths.log_base_path,
            &mut self.paths.watermark_file,
        ]
        .into_iter()
        .flatten()
        {
            resolve(path);
        }
    }

    /// Applies `METADATA_FILE`, `FEED_BASE_PATH`, `LOG_BASE_PATH`,
    /// `AUTOSYS_MOCK_MODE`, `AUTOSYS_ENV` and `WATERMARK_FILE`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("METADATA_FILE") {
            self.paths.metadata_file = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("FEED_BASE_PATH") {
            self.paths.feed_base_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("LOG_BASE_PATH") {
            self.paths.log_base_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("WATERMARK_FILE") {
            self.paths.watermark_file = Some(PathBuf::from(path));
        }
        if let Some(environment) = lookup("AUTOSYS_ENV") {
            self.jobs.environment = Some(environment);
        }
        if let Some(raw) = lookup("AUTOSYS_MOCK_MODE") {
            self.jobs.mock_mode = flag_value(&raw)
                .ok_or_else(|| anyhow!("AUTOSYS_MOCK_MODE must be true or false, got '{raw}'"))?;
        }
        Ok(())
    }

    /// Workbook path: the command line wins over the configuration.
    pub fn metadata_path(&self, cli: Option<&str>) -> Result<PathBuf> {
        cli.map(PathBuf::from)
            .or_else(|| self.paths.metadata_file.clone())
            .ok_or_else(|| {
                anyhow!("No metadata workbook given. Pass a path or set METADATA_FILE")
            })
    }
}

/// Loads the configuration file and applies the process environment.
pub fn resolve(path: Option<&str>) -> Result<RunConfig> {
    let mut config = RunConfig::load(path.map(Path::new))?;
    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
[engine]
max_workers = 8
query_timeout_ms = 5000

[[tables]]
database = "server1"
table = "CUSTOMER_STG"
path = "data/customer_stg.csv"

[paths]
feed_base_path = "/data/feeds"
log_base_path = "logs"

[jobs]
mock_mode = true
names = ["FEED_LOAD_JOB"]
wait_for_completion = "60m"

[[feed_files]]
feed = "CUSTOMER_FEED"
max_age = "24h"
min_size_mb = 0.5

[[log_files]]
job = "FEED_LOAD_JOB"
log_type = "error"
"#;

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedcheck.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = RunConfig::load(Some(&path)).unwrap();
        assert_eq!(config.engine.max_workers, 8);
        assert_eq!(config.engine.sample_size, 10);
        assert_eq!(config.tables[0].path, dir.path().join("data/customer_stg.csv"));
        assert_eq!(config.paths.feed_base_path, Some(PathBuf::from("/data/feeds")));
        assert_eq!(config.paths.log_base_path, Some(dir.path().join("logs")));
        assert_eq!(config.jobs.specs()[0].expected(), "SU");
        assert_eq!(config.jobs.specs()[0].wait_for_completion.as_deref(), Some("60m"));
        assert_eq!(config.feed_files[0].pattern(), "CUSTOMER_FEED*");
        assert_eq!(config.feed_files[0].min_size_mb, Some(0.5));
        assert_eq!(config.log_files[0].pattern(), "FEED_LOAD_JOB*error*.log");
    }

    #[test]
    fn test_invalid_engine_settings_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedcheck.toml");
        std::fs::write(&path, "[engine]\nmax_workers = 0\n").unwrap();
        assert!(RunConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("METADATA_FILE", "meta.yml"),
            ("AUTOSYS_MOCK_MODE", "true"),
            ("AUTOSYS_ENV", "PRD"),
            ("LOG_BASE_PATH", "/var/log/autosys"),
        ]
        .into_iter()
        .collect();

        let mut config = RunConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert!(config.jobs.mock_mode);
        assert_eq!(config.jobs.environment.as_deref(), Some("PRD"));
        assert_eq!(config.paths.log_base_path, Some(PathBuf::from("/var/log/autosys")));
        assert_eq!(config.metadata_path(None).unwrap(), PathBuf::from("meta.yml"));
        assert_eq!(
            config.metadata_path(Some("other.yml")).unwrap(),
            PathBuf::from("other.yml")
        );

        let mut config = RunConfig::default();
        let bad = config.apply_env(|key| (key == "AUTOSYS_MOCK_MODE").then(|| "maybe".to_string()));
        assert!(bad.is_err());
    }
}
