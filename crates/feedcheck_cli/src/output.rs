use anyhow::{Result, bail};
use colored::*;
use feedcheck_core::{CheckOutcome, OutcomeStatus, ReportSink, RunStatus, ValidationSummary};
use std::io::{self, Write};

/// Picks the sink for an output format.
pub fn sink(format: &str) -> Result<Box<dyn ReportSink>> {
    match format {
        "text" => Ok(Box::new(TextSink::new(io::stdout()))),
        "json" => Ok(Box::new(JsonSink::new(io::stdout()))),
        other => bail!("Unsupported output format: {other}. Supported formats: text, json"),
    }
}

fn status_label(status: OutcomeStatus) -> ColoredString {
    match status {
        OutcomeStatus::Pass => "PASS".green().bold(),
        OutcomeStatus::Fail => "FAIL".red().bold(),
        OutcomeStatus::Error => "ERROR".magenta().bold(),
        OutcomeStatus::Skipped => "SKIPPED".dimmed(),
    }
}

/// Console report: failing outcomes as they arrive, then the counts.
pub struct TextSink<W: Write> {
    out: W,
    listed: usize,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, listed: 0 }
    }
}

impl<W: Write> ReportSink for TextSink<W> {
    fn record(&mut self, outcome: &CheckOutcome) -> io::Result<()> {
        if matches!(outcome.status, OutcomeStatus::Pass | OutcomeStatus::Skipped) {
            return Ok(());
        }
        if self.listed == 0 {
            writeln!(self.out, "\n{}", "Findings:".bold())?;
        }
        self.listed += 1;
        writeln!(
            self.out,
            "  {:>7} {} [{}] {}",
            status_label(outcome.status),
            outcome.rule,
            outcome.kind,
            outcome.message
        )
    }

    fn finish(&mut self, summary: &ValidationSummary) -> io::Result<()> {
        writeln!(self.out, "\n{}", "═".repeat(60))?;
        writeln!(self.out, "{}", "  VALIDATION SUMMARY".bold())?;
        writeln!(self.out, "{}", "═".repeat(60))?;

        let headline = match summary.status {
            RunStatus::Pass => format!("{} {}", "✓".green().bold(), "Validation PASSED".green().bold()),
            RunStatus::Fail => format!("{} {}", "✗".red().bold(), "Validation FAILED".red().bold()),
            RunStatus::Error => format!(
                "{} {}",
                "✗".magenta().bold(),
                "Validation ERROR".magenta().bold()
            ),
        };
        writeln!(self.out, "\n{headline}")?;
        if summary.cancelled {
            writeln!(
                self.out,
                "{}",
                "Run was cancelled; only completed checks are reported".yellow()
            )?;
        }

        writeln!(self.out, "\n{}", "By feed:".bold())?;
        for (feed, counts) in &summary.by_feed {
            writeln!(
                self.out,
                "  {feed:<30} pass {:>4}  fail {:>4}  error {:>4}  skipped {:>4}",
                counts.pass, counts.fail, counts.error, counts.skipped
            )?;
        }

        let overall = &summary.overall;
        writeln!(self.out, "\n{}", "Summary:".bold())?;
        writeln!(self.out, "  Total checks: {}", overall.total())?;
        writeln!(self.out, "  Passed:       {}", overall.pass)?;
        writeln!(self.out, "  Failed:       {}", overall.fail)?;
        writeln!(self.out, "  Errors:       {}", overall.error)?;
        writeln!(self.out, "  Skipped:      {}", overall.skipped)?;
        writeln!(self.out, "{}", "═".repeat(60))?;
        self.out.flush()
    }
}

/// Machine-readable report: the whole summary as one JSON document.
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> ReportSink for JsonSink<W> {
    fn finish(&mut self, summary: &ValidationSummary) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, summary)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

/// Feeds a finished summary through a sink.
pub fn report(sink: &mut dyn ReportSink, summary: &ValidationSummary) -> io::Result<()> {
    for outcome in &summary.outcomes {
        sink.record(outcome)?;
    }
    sink.finish(summary)
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

pub fn print_warning(message: &str) {
    eprintln!("{} {}", "!".yellow().bold(), message.yellow());
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}
