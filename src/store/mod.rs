mod sqlite_store;

pub use sqlite_store::{SqliteStore, DECISIONS_TABLE};

use crate::entity::Decision;
use crate::error::Result;

/// How a chunk treats ids that already exist in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Plain insert; an existing id fails the chunk with `DuplicateKey`.
    Insert,
    /// Insert or replace every column of the existing row.
    Upsert,
}

/// Storage handle for decisions.
///
/// Implementations must be usable from several workers at once and must
/// apply each `write_chunk` call atomically.
pub trait DecisionStore: Send + Sync {
    /// Persist one chunk inside a single transaction.
    fn write_chunk(&self, chunk: &[Decision], mode: WriteMode) -> Result<()>;

    /// Number of stored decisions.
    fn count(&self) -> Result<u64>;

    /// Load a stored decision by id.
    fn load(&self, id: &str) -> Result<Option<Decision>>;

    /// On-disk size of the store, if known.
    fn size_bytes(&self) -> Result<Option<u64>> {
        Ok(None)
    }
}
