use anyhow::{Context, Result, bail};
use colored::*;
use feedcheck_core::{CheckKind, CheckScope};
use feedcheck_parser::{LoadedCatalog, load_catalog, parse_file};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::config;
use crate::output;

pub fn execute(metadata: Option<&str>, config_path: Option<&str>, format: &str) -> Result<()> {
    if !matches!(format, "text" | "json") {
        bail!("Unsupported output format: {format}. Supported formats: text, json");
    }
    let config = config::resolve(config_path)?;
    let path = config.metadata_path(metadata)?;
    info!("Checking metadata workbook: {}", path.display());

    let workbook = parse_file(&path)
        .with_context(|| format!("Failed to parse metadata workbook: {}", path.display()))?;
    let loaded = load_catalog(&workbook, &config.engine)
        .with_context(|| format!("Failed to load rules from {}", path.display()))?;

    match format {
        "json" => print_json(&loaded)?,
        _ => print_text(&loaded),
    }
    Ok(())
}

fn rules_per_feed(loaded: &LoadedCatalog) -> BTreeMap<&str, usize> {
    let mut feeds = BTreeMap::new();
    for rule in loaded.catalog.rules() {
        *feeds.entry(rule.feed.as_str()).or_insert(0) += 1;
    }
    feeds
}

/// Feeds whose cell names more than one feed file.
fn listed_feed_files(loaded: &LoadedCatalog) -> BTreeMap<&str, BTreeSet<&str>> {
    let mut feeds: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for rule in loaded.catalog.rules() {
        if rule.feed_files.len() > 1 {
            feeds
                .entry(rule.feed.as_str())
                .or_default()
                .extend(rule.feed_files.iter().map(String::as_str));
        }
    }
    feeds
}

fn declared_checks(loaded: &LoadedCatalog) -> BTreeMap<CheckKind, usize> {
    let mut kinds = BTreeMap::new();
    for rule in loaded.catalog.rules() {
        for kind in CheckKind::ALL {
            if kind.scope() == CheckScope::Column && rule.declares(kind) {
                *kinds.entry(kind).or_insert(0) += 1;
            }
        }
    }
    kinds
}

fn print_text(loaded: &LoadedCatalog) {
    let catalog = &loaded.catalog;
    output::print_success("Metadata workbook is valid");

    println!("\nCatalog Summary:");
    println!("  Rules:        {}", catalog.len());
    println!("  Feeds:        {}", catalog.feeds().len());
    println!(
        "  Databases:    {}",
        catalog.databases().into_iter().collect::<Vec<_>>().join(", ")
    );
    println!("  Enumerations: {}", catalog.enumerations().len());
    println!("  Skipped rows: {}", loaded.skipped);

    println!("\nRules per feed:");
    for (feed, count) in rules_per_feed(loaded) {
        println!("  {feed:<30} {count}");
    }

    let listed = listed_feed_files(loaded);
    if !listed.is_empty() {
        println!("\nFeed files:");
        for (feed, files) in listed {
            let files: Vec<_> = files.into_iter().collect();
            println!("  {feed:<30} {}", files.join(", "));
        }
    }

    println!("\nDeclared column checks:");
    for (kind, count) in declared_checks(loaded) {
        println!("  {:<30} {count}", kind.to_string());
    }

    if !loaded.placeholder_rows.is_empty() {
        println!("\nNot evaluated:");
        for (sheet, rows) in &loaded.placeholder_rows {
            println!("  {sheet:<30} {rows} row(s)");
        }
    }

    if !loaded.rejected.is_empty() {
        println!("\n{}", "Rejected rows:".red().bold());
        for (i, error) in loaded.rejected.iter().enumerate() {
            println!("  {}. {}", i + 1, error.to_string().red());
        }
    }

    if !loaded.unresolved.is_empty() {
        println!("\n{}", "Unresolved enumerations:".yellow().bold());
        for (i, error) in loaded.unresolved.iter().enumerate() {
            println!("  {}. {}", i + 1, error.to_string().yellow());
        }
    }

    if !loaded.warnings.is_empty() {
        println!("\n{}", "Warnings:".yellow().bold());
        for (i, warning) in loaded.warnings.iter().enumerate() {
            println!("  {}. {}", i + 1, warning.to_string().yellow());
        }
    }
}

fn print_json(loaded: &LoadedCatalog) -> Result<()> {
    let catalog = &loaded.catalog;
    let output = json!({
        "rules": catalog.len(),
        "feeds": rules_per_feed(loaded),
        "feed_files": listed_feed_files(loaded),
        "databases": catalog.databases(),
        "enumerations": catalog.enumerations().iter().map(|e| &e.name).collect::<Vec<_>>(),
        "checks": declared_checks(loaded)
            .into_iter()
            .map(|(kind, count)| (kind.to_string(), count))
            .collect::<BTreeMap<_, _>>(),
        "skipped": loaded.skipped,
        "not_evaluated": loaded.placeholder_rows,
        "rejected": loaded.rejected.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
        "unresolved": loaded.unresolved.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
        "warnings": loaded.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
    });

    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("Failed to render catalog as JSON")?
    );
    Ok(())
}
