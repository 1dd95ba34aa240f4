//! Scheduler job status checks.
//!
//! Job status comes from a [`JobStatusProvider`]. The production provider
//! shells out to `autorep`; the mock provider answers from a fixed table so
//! runs can be rehearsed without a scheduler.
//!
//! A job configured with `wait_for_completion` is polled until it reaches a
//! terminal status (`SU`, `FA` or `TE`) or the wait runs out.

use crate::{CheckContext, DataAccessError, access_error, parse_duration};
use async_trait::async_trait;
use feedcheck_core::{CheckKind, CheckOutcome, RuleRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Status reported for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Job name
    pub name: String,
    /// Status code (`SU`, `FA`, `RU`, ...); `None` when the job is unknown
    pub status: Option<String>,
    /// Last start time as printed by the scheduler
    pub last_start: Option<String>,
    /// Next start time as printed by the scheduler
    pub next_start: Option<String>,
}

impl JobStatus {
    /// Status of a job the scheduler does not know.
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: None,
            last_start: None,
            next_start: None,
        }
    }
}

/// Anything that can report the status of a scheduler job.
#[async_trait]
pub trait JobStatusProvider: Debug + Send + Sync {
    /// Current status of `job`.
    async fn status(&self, job: &str) -> Result<JobStatus, DataAccessError>;

    /// Returns a human-readable description of this provider.
    fn description(&self) -> String;
}

/// Parses the detail report printed by `autorep -J <job> -d`.
pub fn parse_autorep(job: &str, output: &str) -> JobStatus {
    let mut status = JobStatus::unknown(job);
    for line in output.lines() {
        if let Some((_, value)) = line.split_once("Last Start:") {
            status.last_start = Some(value.trim().to_string());
        } else if let Some((_, value)) = line.split_once("Next Start:") {
            status.next_start = Some(value.trim().to_string());
        } else if let Some((_, value)) = line.split_once("Status:") {
            let value = value.trim();
            if !value.is_empty() {
                status.status = Some(value.to_string());
            }
        }
    }
    status
}

/// Provider running the `autorep` command.
#[derive(Debug, Clone)]
pub struct AutorepProvider {
    command: PathBuf,
    environment: Option<String>,
    timeout: Duration,
}

impl AutorepProvider {
    /// Creates a provider running `command` (usually `autorep`).
    pub fn new(command: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            environment: None,
            timeout,
        }
    }

    /// Scheduler instance, exported as `AUTOSERV` to the command.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }
}

#[async_trait]
impl JobStatusProvider for AutorepProvider {
    async fn status(&self, job: &str) -> Result<JobStatus, DataAccessError> {
        let mut command = Command::new(&self.command);
        command.args(["-J", job, "-d"]).kill_on_drop(true);
        if let Some(environment) = &self.environment {
            command.env("AUTOSERV", environment);
        }
        debug!(job, command = %self.command.display(), "Running autorep");

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| DataAccessError::Timeout(self.timeout))?
            .map_err(|e| {
                DataAccessError::Scheduler(format!(
                    "failed to run {}: {e}",
                    self.command.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DataAccessError::Scheduler(format!(
                "autorep exited with {} for job {job}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(parse_autorep(job, &String::from_utf8_lossy(&output.stdout)))
    }

    fn description(&self) -> String {
        match &self.environment {
            Some(environment) => format!("autorep ({environment})"),
            None => "autorep".to_string(),
        }
    }
}

/// Provider answering from a fixed table. Unlisted jobs report `SU`.
#[derive(Debug, Clone)]
pub struct MockJobProvider {
    statuses: BTreeMap<String, Option<String>>,
}

impl MockJobProvider {
    /// Creates a provider with the stock demo jobs.
    pub fn new() -> Self {
        let statuses = [
            ("FEED_LOAD_JOB", Some("SU")),
            ("DATA_VALIDATION_JOB", Some("SU")),
            ("FAILED_JOB", Some("FA")),
            ("RUNNING_JOB", Some("RU")),
            ("TIMEOUT_JOB", Some("RU")),
            ("NONEXISTENT_JOB", None),
        ]
        .into_iter()
        .map(|(job, status)| (job.to_string(), status.map(str::to_string)))
        .collect();
        Self { statuses }
    }

    /// Overrides the status of a job; `None` makes it unknown.
    pub fn with_status(mut self, job: &str, status: Option<&str>) -> Self {
        self.statuses
            .insert(job.to_string(), status.map(str::to_string));
        self
    }
}

impl Default for MockJobProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStatusProvider for MockJobProvider {
    async fn status(&self, job: &str) -> Result<JobStatus, DataAccessError> {
        let status = match self.statuses.get(job) {
            Some(status) => status.clone(),
            None => Some("SU".to_string()),
        };
        Ok(JobStatus {
            name: job.to_string(),
            last_start: status.as_ref().map(|_| "2024-01-15 10:30:00".to_string()),
            next_start: status.as_ref().map(|_| "2024-01-16 10:30:00".to_string()),
            status,
        })
    }

    fn description(&self) -> String {
        "mock scheduler".to_string()
    }
}

/// One job to check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Job name
    pub name: String,

    /// Feed the job loads, used for grouping and selection
    #[serde(default)]
    pub feed: Option<String>,

    /// Expected status code (default `SU`)
    #[serde(default)]
    pub expected_status: Option<String>,

    /// Poll until the job finishes, for at most this long (e.g. `60m`)
    #[serde(default)]
    pub wait_for_completion: Option<String>,

    /// Delay between polls while waiting (default `30s`)
    #[serde(default)]
    pub poll_interval: Option<String>,
}

/// Statuses after which a job will not change on its own.
pub const TERMINAL_STATUSES: [&str; 3] = ["SU", "FA", "TE"];

const DEFAULT_POLL_INTERVAL: &str = "30s";

fn std_duration(raw: &str) -> Result<Duration, String> {
    let duration = parse_duration(raw)?;
    duration
        .to_std()
        .map_err(|_| format!("Duration must not be negative: {raw}"))
}

impl JobSpec {
    /// Creates a spec expecting success.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feed: None,
            expected_status: None,
            wait_for_completion: None,
            poll_interval: None,
        }
    }

    /// Expected status code.
    pub fn expected(&self) -> &str {
        self.expected_status.as_deref().unwrap_or("SU")
    }

    pub(crate) fn reference(&self) -> RuleRef {
        let feed = self.feed.clone().unwrap_or_else(|| self.name.clone());
        RuleRef {
            module: feed.clone(),
            feed,
            database: "scheduler".to_string(),
            table: self.name.clone(),
            field: None,
        }
    }
}

/// Compares scheduler job statuses with their expected values.
#[derive(Debug, Clone)]
pub struct JobStatusChecker {
    provider: Arc<dyn JobStatusProvider>,
    jobs: Vec<JobSpec>,
}

impl JobStatusChecker {
    /// Creates a checker for the given jobs.
    pub fn new(provider: Arc<dyn JobStatusProvider>, jobs: Vec<JobSpec>) -> Self {
        Self { provider, jobs }
    }

    /// Configured jobs.
    pub fn jobs(&self) -> &[JobSpec] {
        &self.jobs
    }

    /// Checks one job.
    pub async fn check(&self, job: &JobSpec, ctx: &CheckContext) -> CheckOutcome {
        if let Some(wait) = &job.wait_for_completion {
            return self.await_completion(job, wait, ctx).await;
        }

        let kind = CheckKind::JobStatus;
        let reference = job.reference();
        info!(job = %job.name, provider = %self.provider.description(), "Checking job status");

        let status = match ctx.timed(self.provider.status(&job.name)).await {
            Ok(status) => status,
            Err(err) => return access_error(reference, kind, &err),
        };

        let expected = job.expected();
        let Some(current) = status.status.as_deref() else {
            return CheckOutcome::fail(reference, kind, format!("job {} not found", job.name));
        };
        let observed: Vec<String> = std::iter::once(current.to_string())
            .chain(status.last_start.clone())
            .collect();

        if current == expected {
            CheckOutcome::pass(reference, kind, format!("status {current}")).with_observed(observed)
        } else {
            CheckOutcome::fail(
                reference,
                kind,
                format!("expected status {expected}, got {current}"),
            )
            .with_observed(observed)
        }
    }

    /// Polls a job until it reaches a terminal status or `wait` elapses.
    ///
    /// `SU` passes; `FA` and `TE` fail.
    async fn await_completion(
        &self,
        job: &JobSpec,
        wait: &str,
        ctx: &CheckContext,
    ) -> CheckOutcome {
        let kind = CheckKind::JobStatus;
        let reference = job.reference();
        let poll = job.poll_interval.as_deref().unwrap_or(DEFAULT_POLL_INTERVAL);
        let limits = std_duration(wait).and_then(|timeout| {
            let interval = std_duration(poll)?;
            if interval.is_zero() {
                return Err("poll interval must be positive".to_string());
            }
            Ok((timeout, interval))
        });
        let (timeout, interval) = match limits {
            Ok(limits) => limits,
            Err(message) => return CheckOutcome::error(reference, kind, message),
        };
        info!(job = %job.name, ?timeout, ?interval, "Waiting for job completion");

        let deadline = tokio::time::Instant::now() + timeout;
        let mut polls = 0usize;
        loop {
            polls += 1;
            let status = match ctx.timed(self.provider.status(&job.name)).await {
                Ok(status) => status,
                Err(err) => return access_error(reference, kind, &err),
            };
            let Some(current) = status.status else {
                return CheckOutcome::fail(reference, kind, format!("job {} not found", job.name));
            };
            debug!(job = %job.name, status = %current, polls, "Polled job status");

            if TERMINAL_STATUSES.contains(&current.as_str()) {
                let observed = [current.clone(), polls.to_string()];
                return if current == "SU" {
                    CheckOutcome::pass(reference, kind, "Job completed successfully")
                        .with_observed(observed)
                } else {
                    CheckOutcome::fail(
                        reference,
                        kind,
                        format!("Job completed with status: {current}"),
                    )
                    .with_observed(observed)
                };
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                warn!(job = %job.name, status = %current, "Job did not complete in time");
                return CheckOutcome::fail(
                    reference,
                    kind,
                    format!("Job {} did not complete within {}", job.name, wait.trim()),
                )
                .with_observed([current, polls.to_string()]);
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedcheck_core::{EngineConfig, EnumerationCatalog, OutcomeStatus};
    use pretty_assertions::assert_eq;

    fn ctx() -> CheckContext {
        CheckContext::new(
            Arc::new(EngineConfig::default()),
            Arc::new(EnumerationCatalog::new()),
        )
    }

    #[test]
    fn test_parse_autorep_detail() {
        let output = "\
Job Name: FEED_LOAD_JOB
Status: SU
Last Start: 01/15/2024 10:30:00
Next Start: 01/16/2024 10:30:00
";
        let status = parse_autorep("FEED_LOAD_JOB", output);
        assert_eq!(status.status.as_deref(), Some("SU"));
        assert_eq!(status.last_start.as_deref(), Some("01/15/2024 10:30:00"));
        assert_eq!(status.next_start.as_deref(), Some("01/16/2024 10:30:00"));

        assert_eq!(parse_autorep("X", "").status, None);
    }

    #[tokio::test]
    async fn test_mock_statuses() {
        let checker = JobStatusChecker::new(Arc::new(MockJobProvider::new()), vec![]);

        let outcome = checker.check(&JobSpec::new("FEED_LOAD_JOB"), &ctx()).await;
        assert_eq!(outcome.status, OutcomeStatus::Pass);

        let outcome = checker.check(&JobSpec::new("FAILED_JOB"), &ctx()).await;
        assert_eq!(outcome.status, OutcomeStatus::Fail);
        assert_eq!(outcome.message, "expected status SU, got FA");

        let outcome = checker.check(&JobSpec::new("NONEXISTENT_JOB"), &ctx()).await;
        assert_eq!(outcome.status, OutcomeStatus::Fail);

        let running = JobSpec {
            expected_status: Some("RU".into()),
            ..JobSpec::new("RUNNING_JOB")
        };
        assert_eq!(checker.check(&running, &ctx()).await.status, OutcomeStatus::Pass);

        let outcome = checker.check(&JobSpec::new("ANY_OTHER_JOB"), &ctx()).await;
        assert_eq!(outcome.status, OutcomeStatus::Pass);
    }

    #[tokio::test]
    async fn test_mock_status_override() {
        let provider = MockJobProvider::new()
            .with_status("FEED_LOAD_JOB", Some("TE"))
            .with_status("NIGHTLY_JOB", None);
        let checker = JobStatusChecker::new(Arc::new(provider), vec![]);

        let outcome = checker.check(&JobSpec::new("FEED_LOAD_JOB"), &ctx()).await;
        assert_eq!(outcome.message, "expected status SU, got TE");
        let outcome = checker.check(&JobSpec::new("NIGHTLY_JOB"), &ctx()).await;
        assert_eq!(outcome.status, OutcomeStatus::Fail);
    }

    #[tokio::test]
    async fn test_missing_command_is_error() {
        let provider = AutorepProvider::new(
            "/nonexistent/bin/autorep-feedcheck",
            Duration::from_secs(5),
        );
        let checker = JobStatusChecker::new(Arc::new(provider), vec![]);
        let outcome = checker.check(&JobSpec::new("FEED_LOAD_JOB"), &ctx()).await;
        assert_eq!(outcome.status, OutcomeStatus::Error);
    }

    /// Reports each status once, then repeats the last one.
    #[derive(Debug)]
    struct SequenceProvider {
        statuses: Vec<&'static str>,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl JobStatusProvider for SequenceProvider {
        async fn status(&self, job: &str) -> Result<JobStatus, DataAccessError> {
            let call = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
                .min(self.statuses.len() - 1);
            Ok(JobStatus {
                status: Some(self.statuses[call].to_string()),
                ..JobStatus::unknown(job)
            })
        }

        fn description(&self) -> String {
            "sequence".to_string()
        }
    }

    fn waiting(name: &str, wait: &str) -> JobSpec {
        JobSpec {
            wait_for_completion: Some(wait.into()),
            poll_interval: Some("20ms".into()),
            ..JobSpec::new(name)
        }
    }

    #[tokio::test]
    async fn test_wait_until_job_succeeds() {
        let provider = SequenceProvider {
            statuses: vec!["RU", "RU", "SU"],
            calls: Default::default(),
        };
        let checker = JobStatusChecker::new(Arc::new(provider), vec![]);

        let outcome = checker.check(&waiting("FEED_LOAD_JOB", "5s"), &ctx()).await;
        assert_eq!(outcome.status, OutcomeStatus::Pass);
        assert_eq!(outcome.observed, vec!["SU", "3"]);
    }

    #[tokio::test]
    async fn test_wait_ends_on_failed_or_terminated_job() {
        let provider = MockJobProvider::new().with_status("KILLED_JOB", Some("TE"));
        let checker = JobStatusChecker::new(Arc::new(provider), vec![]);

        let outcome = checker.check(&waiting("FAILED_JOB", "5s"), &ctx()).await;
        assert_eq!(outcome.status, OutcomeStatus::Fail);
        assert_eq!(outcome.message, "Job completed with status: FA");

        let outcome = checker.check(&waiting("KILLED_JOB", "5s"), &ctx()).await;
        assert_eq!(outcome.message, "Job completed with status: TE");

        let outcome = checker.check(&waiting("NONEXISTENT_JOB", "5s"), &ctx()).await;
        assert_eq!(outcome.message, "job NONEXISTENT_JOB not found");
    }

    #[tokio::test]
    async fn test_wait_times_out_on_running_job() {
        let checker = JobStatusChecker::new(Arc::new(MockJobProvider::new()), vec![]);

        let outcome = checker.check(&waiting("TIMEOUT_JOB", "100ms"), &ctx()).await;
        assert_eq!(outcome.status, OutcomeStatus::Fail);
        assert_eq!(outcome.message, "Job TIMEOUT_JOB did not complete within 100ms");
        assert_eq!(outcome.observed[0], "RU");
    }

    #[tokio::test]
    async fn test_invalid_wait_settings_are_errors() {
        let checker = JobStatusChecker::new(Arc::new(MockJobProvider::new()), vec![]);

        let outcome = checker.check(&waiting("FEED_LOAD_JOB", "soon"), &ctx()).await;
        assert_eq!(outcome.status, OutcomeStatus::Error);

        let spec = JobSpec {
            poll_interval: Some("0s".into()),
            ..waiting("FEED_LOAD_JOB", "1m")
        };
        assert_eq!(checker.check(&spec, &ctx()).await.status, OutcomeStatus::Error);
    }
}
