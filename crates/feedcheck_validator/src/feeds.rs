//! Feed file availability and job log files.
//!
//! Each feed lands its files under `<base>/<feed>/`. A feed passes when at
//! least one file matches its pattern and, when configured, the newest one
//! carries the expected date, is recent enough and has a plausible size.
//!
//! Scheduler jobs write their logs under `<log base>/<job>/`. The log check
//! looks for the newest log of a given type with the same date rule.

use crate::{CheckContext, DataAccessError, access_error};
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use feedcheck_core::{CheckKind, CheckOutcome, RuleRef};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// One feed whose landing directory is checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedFileSpec {
    /// Feed name; also the directory under the base path
    pub feed: String,

    /// Glob pattern inside the feed directory (default `<feed>*`)
    #[serde(default)]
    pub pattern: Option<String>,

    /// Expected modification date of the newest file, `YYYYMMDD`
    #[serde(default)]
    pub expected_date: Option<String>,

    /// Maximum age of the newest file, e.g. `24h` or `2d`
    #[serde(default)]
    pub max_age: Option<String>,

    /// Lower size bound of the newest file, in MB
    #[serde(default)]
    pub min_size_mb: Option<f64>,

    /// Upper size bound of the newest file, in MB
    #[serde(default)]
    pub max_size_mb: Option<f64>,
}

impl FeedFileSpec {
    /// Creates a spec with the default pattern and no date constraints.
    pub fn new(feed: impl Into<String>) -> Self {
        Self {
            feed: feed.into(),
            pattern: None,
            expected_date: None,
            max_age: None,
            min_size_mb: None,
            max_size_mb: None,
        }
    }

    /// Pattern used for matching.
    pub fn pattern(&self) -> String {
        self.pattern
            .clone()
            .unwrap_or_else(|| format!("{}*", self.feed))
    }

    pub(crate) fn reference(&self) -> RuleRef {
        RuleRef {
            feed: self.feed.clone(),
            module: self.feed.clone(),
            database: "filesystem".to_string(),
            table: format!("{}/{}", self.feed, self.pattern()),
            field: None,
        }
    }
}

/// Parses a duration string like "24h", "30m", "2d" or "500ms".
///
/// A bare number is taken as hours.
pub fn parse_duration(duration_str: &str) -> Result<Duration, String> {
    let duration_str = duration_str.trim();
    if duration_str.is_empty() {
        return Err("Duration string is empty".to_string());
    }

    let (num_str, unit) = duration_str.split_at(
        duration_str
            .chars()
            .position(|c| !c.is_ascii_digit())
            .unwrap_or(duration_str.len()),
    );
    let num: i64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {duration_str}"))?;

    let duration = match unit.trim().to_lowercase().as_str() {
        "ms" | "millis" | "milliseconds" => Duration::try_milliseconds(num),
        "s" | "sec" | "second" | "seconds" => Duration::try_seconds(num),
        "m" | "min" | "minute" | "minutes" => Duration::try_minutes(num),
        "" | "h" | "hr" | "hour" | "hours" => Duration::try_hours(num),
        "d" | "day" | "days" => Duration::try_days(num),
        "w" | "week" | "weeks" => Duration::try_weeks(num),
        other => return Err(format!("Unknown duration unit: {other}")),
    };
    duration.ok_or_else(|| format!("Duration out of range: {duration_str}"))
}

fn parse_expected_date(raw: Option<&str>) -> Result<Option<NaiveDate>, String> {
    raw.map(|raw| {
        NaiveDate::parse_from_str(raw.trim(), "%Y%m%d")
            .map_err(|e| format!("invalid expected date '{raw}': {e}"))
    })
    .transpose()
}

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A regular file matched by a pattern.
#[derive(Debug)]
struct LandedFile {
    path: PathBuf,
    modified: SystemTime,
    size: u64,
}

impl LandedFile {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn date(&self) -> NaiveDate {
        DateTime::<Local>::from(self.modified).date_naive()
    }

    fn size_mb(&self) -> f64 {
        self.size as f64 / BYTES_PER_MB
    }
}

/// Files found in one directory, newest first.
#[derive(Debug)]
struct Scan {
    directory_exists: bool,
    files: Vec<LandedFile>,
}

fn scan(directory: &Path, pattern: &str) -> Result<Scan, DataAccessError> {
    if !directory.is_dir() {
        return Ok(Scan {
            directory_exists: false,
            files: Vec::new(),
        });
    }

    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&directory.to_string_lossy()),
        pattern
    );
    let entries = glob::glob(&full)
        .map_err(|e| DataAccessError::Io(format!("invalid pattern '{pattern}': {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| DataAccessError::Io(e.to_string()))?;
        let metadata = std::fs::metadata(&path)?;
        if metadata.is_file() {
            files.push(LandedFile {
                path,
                modified: metadata.modified()?,
                size: metadata.len(),
            });
        }
    }
    files.sort_by(|a, b| b.modified.cmp(&a.modified));

    Ok(Scan {
        directory_exists: true,
        files,
    })
}

async fn scan_blocking(
    ctx: &CheckContext,
    directory: &Path,
    pattern: &str,
) -> Result<Scan, DataAccessError> {
    let directory = directory.to_path_buf();
    let pattern = pattern.to_string();
    ctx.timed(async move {
        tokio::task::spawn_blocking(move || scan(&directory, &pattern))
            .await
            .map_err(|e| DataAccessError::Io(e.to_string()))?
    })
    .await
}

fn size_violation(
    file: &LandedFile,
    min_mb: Option<f64>,
    max_mb: Option<f64>,
) -> Option<String> {
    let size = file.size_mb();
    if let Some(min) = min_mb.filter(|min| size < *min) {
        return Some(format!("file size {size:.2} MB is below minimum {min} MB"));
    }
    if let Some(max) = max_mb.filter(|max| size > *max) {
        return Some(format!("file size {size:.2} MB exceeds maximum {max} MB"));
    }
    None
}

/// Checks feed landing directories under a base path.
#[derive(Debug, Clone)]
pub struct FeedFileChecker {
    base_path: PathBuf,
    feeds: Vec<FeedFileSpec>,
}

impl FeedFileChecker {
    /// Creates a checker for the given feeds.
    pub fn new(base_path: impl Into<PathBuf>, feeds: Vec<FeedFileSpec>) -> Self {
        Self {
            base_path: base_path.into(),
            feeds,
        }
    }

    /// Configured feeds.
    pub fn feeds(&self) -> &[FeedFileSpec] {
        &self.feeds
    }

    /// Base directory holding one sub-directory per feed.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Checks one feed.
    pub async fn check(&self, spec: &FeedFileSpec, ctx: &CheckContext) -> CheckOutcome {
        let kind = CheckKind::FeedFile;
        let reference = spec.reference();
        let directory = self.base_path.join(&spec.feed);
        let pattern = spec.pattern();
        info!(feed = %spec.feed, directory = %directory.display(), "Checking feed files");

        let expected_date = match parse_expected_date(spec.expected_date.as_deref()) {
            Ok(date) => date,
            Err(message) => return CheckOutcome::error(reference, kind, message),
        };
        let max_age = match spec.max_age.as_deref().map(parse_duration).transpose() {
            Ok(age) => age,
            Err(message) => return CheckOutcome::error(reference, kind, message),
        };

        let scan = match scan_blocking(ctx, &directory, &pattern).await {
            Ok(scan) => scan,
            Err(err) => return access_error(reference, kind, &err),
        };

        if !scan.directory_exists {
            return CheckOutcome::fail(
                reference,
                kind,
                format!("feed directory does not exist: {}", directory.display()),
            );
        }
        let Some(newest) = scan.files.first() else {
            return CheckOutcome::fail(
                reference,
                kind,
                format!("no files found matching pattern: {pattern}"),
            );
        };

        let name = newest.name();
        let observed = [name.clone(), scan.files.len().to_string()];
        debug!(feed = %spec.feed, newest = %name, files = scan.files.len(), "Feed files found");

        if let Some(expected) = expected_date {
            let file_date = newest.date();
            if file_date != expected {
                return CheckOutcome::fail(
                    reference,
                    kind,
                    format!("file date {file_date} does not match expected date {expected}"),
                )
                .with_observed(observed);
            }
        }
        if let Some(max_age) = max_age {
            let age = Utc::now() - DateTime::<Utc>::from(newest.modified);
            if age > max_age {
                return CheckOutcome::fail(
                    reference,
                    kind,
                    format!(
                        "newest file {name} is {}h old (max {}h)",
                        age.num_hours(),
                        max_age.num_hours()
                    ),
                )
                .with_observed(observed);
            }
        }
        if let Some(message) = size_violation(newest, spec.min_size_mb, spec.max_size_mb) {
            return CheckOutcome::fail(reference, kind, format!("{name}: {message}"))
                .with_observed(observed);
        }

        CheckOutcome::pass(reference, kind, format!("feed file found: {name}"))
            .with_observed(observed)
    }
}

/// One job whose log directory is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFileSpec {
    /// Scheduler job name; also the directory under the log base path
    pub job: String,

    /// Feed the job belongs to, used for feed selection
    #[serde(default)]
    pub feed: Option<String>,

    /// `error`, `info` or `debug`; anything else matches every log
    #[serde(default)]
    pub log_type: Option<String>,

    /// Expected modification date of the newest log, `YYYYMMDD`
    #[serde(default)]
    pub expected_date: Option<String>,
}

impl LogFileSpec {
    /// Creates a spec matching every log of the job.
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            feed: None,
            log_type: None,
            expected_date: None,
        }
    }

    /// Pattern used for matching.
    pub fn pattern(&self) -> String {
        let job = &self.job;
        match self.log_type.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some(level @ ("error" | "info" | "debug")) => format!("{job}*{level}*.log"),
            _ => format!("{job}*.log"),
        }
    }

    pub(crate) fn reference(&self) -> RuleRef {
        RuleRef {
            feed: self.feed.clone().unwrap_or_else(|| self.job.clone()),
            module: self.job.clone(),
            database: "logs".to_string(),
            table: format!("{}/{}", self.job, self.pattern()),
            field: None,
        }
    }
}

/// Checks job log directories under a base path.
#[derive(Debug, Clone)]
pub struct LogFileChecker {
    base_path: PathBuf,
    logs: Vec<LogFileSpec>,
}

impl LogFileChecker {
    /// Creates a checker for the given jobs.
    pub fn new(base_path: impl Into<PathBuf>, logs: Vec<LogFileSpec>) -> Self {
        Self {
            base_path: base_path.into(),
            logs,
        }
    }

    /// Configured log checks.
    pub fn logs(&self) -> &[LogFileSpec] {
        &self.logs
    }

    /// Checks the logs of one job.
    pub async fn check(&self, spec: &LogFileSpec, ctx: &CheckContext) -> CheckOutcome {
        let kind = CheckKind::LogFile;
        let reference = spec.reference();
        let directory = self.base_path.join(&spec.job);
        let pattern = spec.pattern();
        info!(job = %spec.job, directory = %directory.display(), "Checking log files");

        let expected_date = match parse_expected_date(spec.expected_date.as_deref()) {
            Ok(date) => date,
            Err(message) => return CheckOutcome::error(reference, kind, message),
        };
        let scan = match scan_blocking(ctx, &directory, &pattern).await {
            Ok(scan) => scan,
            Err(err) => return access_error(reference, kind, &err),
        };

        if !scan.directory_exists {
            return CheckOutcome::fail(
                reference,
                kind,
                format!("log directory does not exist: {}", directory.display()),
            );
        }
        let Some(newest) = scan.files.first() else {
            return CheckOutcome::fail(
                reference,
                kind,
                format!("no log files found matching pattern: {pattern}"),
            );
        };

        let name = newest.name();
        let observed = [name.clone(), scan.files.len().to_string()];
        if let Some(expected) = expected_date {
            let log_date = newest.date();
            if log_date != expected {
                return CheckOutcome::fail(
                    reference,
                    kind,
                    format!("log date {log_date} does not match expected date {expected}"),
                )
                .with_observed(observed);
            }
        }

        CheckOutcome::pass(reference, kind, format!("log file found: {name}"))
            .with_observed(observed)
    }
}
