use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tracing::info;

use super::commands::{ImportArgs, RangeArgs, SourceArgs};
use crate::config::SorloadConfig;
use crate::error::Result;
use crate::persist::DuplicatePolicy;
use crate::pipeline::{DateRange, DumpSource, Pipeline, RunReport};
use crate::store::{DecisionStore, SqliteStore};
use crate::warnings::{check_run, format_warning};

fn apply_source_args(config: &mut SorloadConfig, source: &SourceArgs) {
    if let Some(base_url) = &source.base_url {
        config.source.base_url = base_url.clone();
    }
    if let Some(prefix) = &source.prefix {
        config.source.prefix = prefix.clone();
    }
}

/// Merge command-line flags over the file configuration.
fn import_config(config_path: Option<&Path>, args: &ImportArgs) -> Result<SorloadConfig> {
    let mut config = SorloadConfig::load(config_path)?;
    apply_source_args(&mut config, &args.source);
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(database) = &args.database {
        config.database = database.clone();
    }
    if args.overwrite_duplicates {
        config.duplicates = DuplicatePolicy::from_flags(true, args.skip_duplicate_check);
    }
    config.validate()?;
    Ok(config)
}

fn date_range(range: &RangeArgs) -> Result<DateRange> {
    DateRange::new(range.from, range.to)
}

pub async fn handle_import(config_path: Option<&Path>, args: ImportArgs) -> Result<()> {
    let range = date_range(&args.range)?;
    let config = import_config(config_path, &args)?;

    for warning in check_run(&range, Local::now().date_naive(), config.duplicates) {
        eprintln!("{}", format_warning(&warning));
    }

    let store = Arc::new(SqliteStore::open(&config.database)?);
    info!(
        database = %config.database.display(),
        from = %range.start(),
        to = %range.end(),
        days = range.day_count(),
        workers = config.workers,
        policy = %config.duplicates,
        "Starting import"
    );

    let pipeline = Pipeline::from_config(&config, store.clone())?;
    let report = pipeline.run(range).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, store.size_bytes()?);
    }

    Ok(())
}

fn print_report(report: &RunReport, size_bytes: Option<u64>) {
    println!("Rows persisted: {}", report.rows_persisted);
    println!(
        "Dumps imported: {}/{}",
        report.urls_succeeded, report.urls_dispatched
    );
    if report.rows_skipped > 0 {
        println!("Rows skipped (no uuid): {}", report.rows_skipped);
    }
    for failure in &report.failures {
        println!("  failed: {} - {}", failure.url, failure.error);
    }
    println!("Elapsed: {:.1}s", report.elapsed_ms as f64 / 1000.0);
    if let Some(size) = size_bytes {
        println!("Database size: {:.1}MB", size as f64 / (1024.0 * 1024.0));
    }
}

pub fn handle_urls(config_path: Option<&Path>, range: RangeArgs, source: SourceArgs) -> Result<()> {
    let range = date_range(&range)?;
    let mut config = SorloadConfig::load(config_path)?;
    apply_source_args(&mut config, &source);
    config.validate()?;

    for url in DumpSource::from_config(&config.source).urls(&range) {
        println!("{}", url);
    }
    Ok(())
}
