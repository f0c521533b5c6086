//! The ingestion pipeline.
//!
//! One producer enumerates a URL per day into a bounded queue, a fixed pool
//! of workers takes URLs off the queue and runs fetch, extract, normalize and
//! persist for each, and an aggregator collects exactly one outcome per URL.
//! A failed URL is reported and never stops the other workers.

mod source;

pub use source::{DateRange, DumpSource};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::archive;
use crate::config::SorloadConfig;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::normalize;
use crate::persist::{persist_with_policy, DuplicatePolicy};
use crate::store::DecisionStore;

/// Everything a worker shares with the rest of the run.
pub struct RunContext {
    pub store: Arc<dyn DecisionStore>,
    pub policy: DuplicatePolicy,
    pub chunk_size: usize,
    persisted: AtomicU64,
}

impl RunContext {
    pub fn new(store: Arc<dyn DecisionStore>, policy: DuplicatePolicy, chunk_size: usize) -> Self {
        Self {
            store,
            policy,
            chunk_size,
            persisted: AtomicU64::new(0),
        }
    }

    /// Rows committed so far in this run.
    pub fn persisted(&self) -> u64 {
        self.persisted.load(Ordering::Relaxed)
    }

    pub fn counter(&self) -> &AtomicU64 {
        &self.persisted
    }
}

/// What one URL contributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UrlSummary {
    pub written: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlFailure {
    pub url: String,
    pub error: String,
}

/// Totals for a finished run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub urls_dispatched: usize,
    pub urls_succeeded: usize,
    pub failures: Vec<UrlFailure>,
    pub rows_persisted: u64,
    pub rows_skipped: usize,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    GeneratingUrls,
    Dispatching,
    Draining,
    Reporting,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::GeneratingUrls => write!(f, "generating-urls"),
            RunPhase::Dispatching => write!(f, "dispatching"),
            RunPhase::Draining => write!(f, "draining"),
            RunPhase::Reporting => write!(f, "reporting"),
        }
    }
}

struct UrlOutcome {
    url: String,
    result: Result<UrlSummary>,
}

#[derive(Default)]
struct Tally {
    received: usize,
    succeeded: usize,
    skipped: usize,
    failures: Vec<UrlFailure>,
}

pub struct Pipeline {
    ctx: Arc<RunContext>,
    fetcher: Fetcher,
    source: DumpSource,
    workers: usize,
}

impl Pipeline {
    pub fn new(ctx: Arc<RunContext>, fetcher: Fetcher, source: DumpSource, workers: usize) -> Self {
        Self {
            ctx,
            fetcher,
            source,
            workers: workers.max(1),
        }
    }

    /// Build a pipeline from validated configuration and an open store.
    pub fn from_config(config: &SorloadConfig, store: Arc<dyn DecisionStore>) -> Result<Self> {
        config.validate()?;
        let ctx = RunContext::new(store, config.duplicates, config.chunk_size);
        Ok(Self::new(
            Arc::new(ctx),
            Fetcher::new(&config.fetch)?,
            DumpSource::from_config(&config.source),
            config.workers,
        ))
    }

    /// Process every day in `range` and report. Individual URL failures end
    /// up in the report; they never abort the run.
    pub async fn run(&self, range: DateRange) -> RunReport {
        let started = Instant::now();

        enter(RunPhase::GeneratingUrls);
        let urls = self.source.urls(&range);
        let dispatched = urls.len();

        enter(RunPhase::Dispatching);
        let (url_tx, url_rx) = mpsc::channel::<String>(self.workers);
        let url_rx = Arc::new(Mutex::new(url_rx));
        let (result_tx, result_rx) = mpsc::channel::<UrlOutcome>(self.workers);

        let producer = tokio::spawn(async move {
            for url in urls {
                if url_tx.send(url).await.is_err() {
                    break;
                }
            }
            // url_tx dropped here, closing the queue
        });

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            workers.spawn(worker_loop(
                id,
                Arc::clone(&url_rx),
                result_tx.clone(),
                Arc::clone(&self.ctx),
                self.fetcher.clone(),
            ));
        }
        drop(result_tx);

        let aggregator = tokio::spawn(aggregate(result_rx, Arc::clone(&self.ctx)));

        enter(RunPhase::Draining);
        if let Err(e) = producer.await {
            error!(error = %e, "URL producer failed");
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker failed");
            }
        }
        let tally = match aggregator.await {
            Ok(tally) => tally,
            Err(e) => {
                error!(error = %e, "Result aggregator failed");
                Tally::default()
            }
        };

        enter(RunPhase::Reporting);
        if tally.received != dispatched {
            warn!(dispatched, received = tally.received, "Not every URL produced a result");
        }
        let report = RunReport {
            urls_dispatched: dispatched,
            urls_succeeded: tally.succeeded,
            failures: tally.failures,
            rows_persisted: self.ctx.persisted(),
            rows_skipped: tally.skipped,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            urls = report.urls_dispatched,
            succeeded = report.urls_succeeded,
            failed = report.failures.len(),
            rows = report.rows_persisted,
            "Run finished"
        );
        report
    }
}

fn enter(phase: RunPhase) {
    debug!(phase = %phase, "Pipeline phase");
}

async fn worker_loop(
    id: usize,
    urls: Arc<Mutex<mpsc::Receiver<String>>>,
    results: mpsc::Sender<UrlOutcome>,
    ctx: Arc<RunContext>,
    fetcher: Fetcher,
) {
    loop {
        let next = urls.lock().await.recv().await;
        let Some(url) = next else { break };

        let result = process_url(&ctx, &fetcher, &url).await;
        if results.send(UrlOutcome { url, result }).await.is_err() {
            break;
        }
    }
    debug!(worker = id, "Queue drained, worker exiting");
}

async fn aggregate(mut results: mpsc::Receiver<UrlOutcome>, ctx: Arc<RunContext>) -> Tally {
    let mut tally = Tally::default();
    while let Some(outcome) = results.recv().await {
        tally.received += 1;
        match outcome.result {
            Ok(summary) => {
                tally.succeeded += 1;
                tally.skipped += summary.skipped;
                info!(
                    url = %outcome.url,
                    written = summary.written,
                    total = ctx.persisted(),
                    "Dump imported"
                );
            }
            Err(e) => {
                error!(url = %outcome.url, error = %e, "Dump failed");
                tally.failures.push(UrlFailure {
                    url: outcome.url,
                    error: e.to_string(),
                });
            }
        }
    }
    tally
}

/// Fetch one dump and run it through the rest of the pipeline.
pub async fn process_url(ctx: &Arc<RunContext>, fetcher: &Fetcher, url: &str) -> Result<UrlSummary> {
    let data = fetcher.fetch(url).await?;
    process_archive(ctx, data).await
}

/// Extract, normalize and persist one downloaded archive.
pub async fn process_archive(ctx: &Arc<RunContext>, data: Bytes) -> Result<UrlSummary> {
    let tables = archive::extract(data).await?;
    let ctx = Arc::clone(ctx);
    tokio::task::spawn_blocking(move || {
        let parsed = normalize::parse_tables(&tables);
        drop(tables);
        let written = persist_with_policy(
            ctx.store.as_ref(),
            &parsed.decisions,
            ctx.chunk_size,
            ctx.policy,
            ctx.counter(),
        )?;
        Ok(UrlSummary {
            written,
            skipped: parsed.skipped,
        })
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn zip_of(members: Vec<(&str, &str)>) -> Bytes {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, content) in members {
            writer.start_file(name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        Bytes::from(writer.finish().unwrap().into_inner())
    }

    fn context(policy: DuplicatePolicy) -> Arc<RunContext> {
        let store = SqliteStore::open_in_memory().unwrap();
        Arc::new(RunContext::new(Arc::new(store), policy, 2))
    }

    #[tokio::test]
    async fn test_process_archive_persists_rows() {
        let ctx = context(DuplicatePolicy::Reject);
        let data = zip_of(vec![
            ("part-1.csv", "uuid,category\na,X\nb,Y\n,Z\n"),
            ("part-2.csv", "uuid,category\nc,X\n"),
        ]);

        let summary = process_archive(&ctx, data).await.unwrap();
        assert_eq!(summary, UrlSummary { written: 3, skipped: 1 });
        assert_eq!(ctx.persisted(), 3);
        assert_eq!(ctx.store.count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_process_archive_duplicate_under_reject() {
        let ctx = context(DuplicatePolicy::Reject);
        process_archive(&ctx, zip_of(vec![("a.csv", "uuid\na\n")])).await.unwrap();

        let err = process_archive(&ctx, zip_of(vec![("a.csv", "uuid\na\n")]))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());
    }

    #[tokio::test]
    async fn test_process_archive_duplicate_under_overwrite() {
        let ctx = context(DuplicatePolicy::Overwrite);
        process_archive(&ctx, zip_of(vec![("a.csv", "uuid,category\na,old\n")]))
            .await
            .unwrap();
        process_archive(&ctx, zip_of(vec![("a.csv", "uuid,category\na,new\n")]))
            .await
            .unwrap();

        assert_eq!(ctx.store.count().unwrap(), 1);
        assert_eq!(ctx.store.load("a").unwrap().unwrap().category, "new");
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_error() {
        let ctx = context(DuplicatePolicy::Reject);
        let err = process_archive(&ctx, Bytes::from_static(b"nope")).await.unwrap_err();
        assert!(matches!(err, crate::error::SorloadError::Archive(_)));
        assert_eq!(ctx.persisted(), 0);
    }

    #[test]
    fn test_report_is_clean() {
        let mut report = RunReport::default();
        assert!(report.is_clean());
        report.failures.push(UrlFailure {
            url: "u".to_string(),
            error: "e".to_string(),
        });
        assert!(!report.is_clean());
    }
}
