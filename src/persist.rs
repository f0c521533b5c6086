//! Chunked, transactional persistence of decision batches.
//!
//! Each chunk is committed on its own, so a failure on chunk K leaves chunks
//! before K in storage. The run-wide counter is bumped once per committed row.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::entity::Decision;
use crate::error::Result;
use crate::store::{DecisionStore, WriteMode};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// What to do when an archive contains ids that are already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Fail the batch on the first duplicate id.
    #[default]
    Reject,
    /// Try a plain insert; on a duplicate id, write the same batch once more as upserts.
    Overwrite,
    /// Skip the insert attempt and always upsert.
    AlwaysOverwrite,
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicatePolicy::Reject => write!(f, "reject"),
            DuplicatePolicy::Overwrite => write!(f, "overwrite"),
            DuplicatePolicy::AlwaysOverwrite => write!(f, "always-overwrite"),
        }
    }
}

impl DuplicatePolicy {
    /// Map the two command-line switches onto a policy.
    pub fn from_flags(overwrite: bool, skip_check: bool) -> Self {
        match (overwrite, skip_check) {
            (true, true) => DuplicatePolicy::AlwaysOverwrite,
            (true, false) => DuplicatePolicy::Overwrite,
            (false, _) => DuplicatePolicy::Reject,
        }
    }
}

/// Write `decisions` in order, `chunk_size` at a time, one transaction per
/// chunk. Returns the number of rows written, or the first error.
pub fn write_batch(
    store: &dyn DecisionStore,
    decisions: &[Decision],
    chunk_size: usize,
    mode: WriteMode,
    counter: &AtomicU64,
) -> Result<usize> {
    let mut written = 0;
    write_chunks(store, decisions, chunk_size, mode, counter, 0, &mut written)?;
    Ok(written)
}

/// Chunk loop shared by both passes. `written` holds the rows committed so
/// far, even when an error is returned. Chunks that fall entirely inside the
/// first `already_counted` rows are written but not added to `counter`.
fn write_chunks(
    store: &dyn DecisionStore,
    decisions: &[Decision],
    chunk_size: usize,
    mode: WriteMode,
    counter: &AtomicU64,
    already_counted: usize,
    written: &mut usize,
) -> Result<()> {
    for (index, chunk) in decisions.chunks(chunk_size.max(1)).enumerate() {
        store.write_chunk(chunk, mode).map_err(|e| {
            debug!(chunk = index, rows = chunk.len(), error = %e, "Chunk rolled back");
            e
        })?;
        if *written >= already_counted {
            counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
        }
        *written += chunk.len();
    }
    Ok(())
}

/// Persist a batch under `policy`, escalating to upserts at most once.
///
/// On escalation the chunks the insert pass already committed are rewritten
/// but counted only once.
pub fn persist_with_policy(
    store: &dyn DecisionStore,
    decisions: &[Decision],
    chunk_size: usize,
    policy: DuplicatePolicy,
    counter: &AtomicU64,
) -> Result<usize> {
    match policy {
        DuplicatePolicy::Reject => {
            write_batch(store, decisions, chunk_size, WriteMode::Insert, counter)
        }
        DuplicatePolicy::AlwaysOverwrite => {
            write_batch(store, decisions, chunk_size, WriteMode::Upsert, counter)
        }
        DuplicatePolicy::Overwrite => {
            let mut committed = 0;
            match write_chunks(store, decisions, chunk_size, WriteMode::Insert, counter, 0, &mut committed) {
                Ok(()) => Ok(committed),
                Err(e) if e.is_duplicate_key() => {
                    info!(rows = decisions.len(), committed, "Duplicates detected, overwriting");
                    let mut written = 0;
                    write_chunks(
                        store,
                        decisions,
                        chunk_size,
                        WriteMode::Upsert,
                        counter,
                        committed,
                        &mut written,
                    )?;
                    Ok(written)
                }
                Err(e) => Err(e),
            }
        }
    }
}
