//! Recursive extraction of tabular members from dump archives.
//!
//! A dump is a zip whose members are CSV files, gzip-compressed CSV files,
//! or further zips. Each top-level member is extracted on its own blocking
//! task and the per-task results are merged once every task has finished.
//! Output order is not meaningful.

use std::io::{Cursor, Read};

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::{Result, SorloadError};

/// Upper bound on the buffer reserved up front for a member. The size in the
/// zip header comes from the archive and is not trusted beyond this.
const MEMBER_SIZE_HINT_CAP: u64 = 64 << 20;

/// How a member is handled, decided from its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Container,
    Gzip,
    Plain,
}

impl MemberKind {
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            MemberKind::Container
        } else if lower.ends_with(".gz") {
            MemberKind::Gzip
        } else {
            MemberKind::Plain
        }
    }
}

/// Extract every leaf table from a zip archive.
///
/// A top-level archive that cannot be opened is an error. A member that
/// cannot be read is logged and skipped.
pub async fn extract(data: Bytes) -> Result<Vec<Vec<u8>>> {
    let member_count = open(data.clone())?.len();

    let mut tasks = JoinSet::new();
    for index in 0..member_count {
        let data = data.clone();
        tasks.spawn_blocking(move || extract_top_level_member(data, index));
    }

    let mut tables = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(local) => tables.extend(local),
            Err(e) => warn!(error = %e, "Extraction task failed"),
        }
    }

    debug!(members = member_count, tables = tables.len(), "Archive extracted");
    Ok(tables)
}

/// Sequential extraction of a whole archive, used for nested containers.
pub fn extract_nested(data: Bytes) -> Result<Vec<Vec<u8>>> {
    let mut archive = open(data)?;
    let mut tables = Vec::new();
    for index in 0..archive.len() {
        match read_member(&mut archive, index) {
            Ok(Some((name, raw))) => match expand_member(&name, raw) {
                Ok(found) => tables.extend(found),
                Err(e) => warn!(member = %name, error = %e, "Skipping unreadable member"),
            },
            Ok(None) => {}
            Err(e) => warn!(member = index, error = %e, "Skipping unreadable member"),
        }
    }
    Ok(tables)
}

fn open(data: Bytes) -> Result<ZipArchive<Cursor<Bytes>>> {
    Ok(ZipArchive::new(Cursor::new(data))?)
}

fn extract_top_level_member(data: Bytes, index: usize) -> Vec<Vec<u8>> {
    let member = open(data).and_then(|mut archive| read_member(&mut archive, index));
    let (name, raw) = match member {
        Ok(Some(member)) => member,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(member = index, error = %e, "Skipping unreadable member");
            return Vec::new();
        }
    };

    match expand_member(&name, raw) {
        Ok(tables) => tables,
        Err(e) => {
            warn!(member = %name, error = %e, "Skipping unreadable member");
            Vec::new()
        }
    }
}

/// Read a member's raw bytes. Directories yield `None`.
fn read_member(
    archive: &mut ZipArchive<Cursor<Bytes>>,
    index: usize,
) -> Result<Option<(String, Vec<u8>)>> {
    let mut file = archive.by_index(index)?;
    if file.is_dir() {
        return Ok(None);
    }
    let name = file.name().to_string();
    let mut raw = Vec::with_capacity(file.size().min(MEMBER_SIZE_HINT_CAP) as usize);
    file.read_to_end(&mut raw)?;
    Ok(Some((name, raw)))
}

fn expand_member(name: &str, raw: Vec<u8>) -> Result<Vec<Vec<u8>>> {
    match MemberKind::from_name(name) {
        MemberKind::Container => extract_nested(Bytes::from(raw)),
        MemberKind::Gzip => {
            let mut decoded = Vec::new();
            MultiGzDecoder::new(raw.as_slice())
                .read_to_end(&mut decoded)
                .map_err(|e| SorloadError::Archive(format!("{}: {}", name, e)))?;
            Ok(vec![decoded])
        }
        MemberKind::Plain => Ok(vec![raw]),
    }
}
