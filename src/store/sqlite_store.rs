use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, Row};

use super::{DecisionStore, WriteMode};
use crate::entity::Decision;
use crate::error::{Result, SorloadError};

pub const DECISIONS_TABLE: &str = "decisions";

/// Column order shared by the insert statements and `params!` in `write_chunk`.
const COLUMNS: [&str; 41] = [
    "id",
    "decision_visibility",
    "decision_visibility_other",
    "end_date_visibility_restriction",
    "decision_monetary",
    "decision_monetary_other",
    "end_date_monetary_restriction",
    "decision_provision",
    "end_date_service_restriction",
    "decision_account",
    "end_date_account_restriction",
    "account_type",
    "decision_ground",
    "decision_ground_reference_url",
    "illegal_content_legal_ground",
    "illegal_content_explanation",
    "incompatible_content_ground",
    "incompatible_content_explanation",
    "incompatible_content_illegal",
    "category",
    "category_addition",
    "category_specification",
    "category_specification_other",
    "content_type",
    "content_type_other",
    "content_language",
    "content_date",
    "territorial_scope",
    "application_date",
    "decision_facts",
    "source_type",
    "source_identity",
    "automated_detection",
    "automated_decision",
    "platform_name",
    "platform_uid",
    "created_at",
    "uid_time",
    "uid_entity_id",
    "uid_entity_type",
    "ingested_at",
];

/// SQLite-backed decision storage.
///
/// Tag collections are stored as JSON arrays, timestamps as RFC 3339 text
/// and tri-state booleans as nullable integers.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    insert_sql: String,
    upsert_sql: String,
}

impl SqliteStore {
    /// Open or create the database file and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, Some(path.to_path_buf()))
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        init_schema(&conn)?;

        let column_list = COLUMNS.join(", ");
        let placeholders = (1..=COLUMNS.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            DECISIONS_TABLE, column_list, placeholders
        );
        let updates = COLUMNS
            .iter()
            .skip(1)
            .map(|c| format!("{c} = excluded.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let upsert_sql = format!("{} ON CONFLICT(id) DO UPDATE SET {}", insert_sql, updates);

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            insert_sql,
            upsert_sql,
        })
    }

    /// Path of the database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SorloadError::Storage("connection mutex poisoned".to_string()))
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS decisions (
            id TEXT PRIMARY KEY,
            decision_visibility TEXT NOT NULL,
            decision_visibility_other TEXT NOT NULL,
            end_date_visibility_restriction TEXT,
            decision_monetary TEXT NOT NULL,
            decision_monetary_other TEXT NOT NULL,
            end_date_monetary_restriction TEXT,
            decision_provision TEXT NOT NULL,
            end_date_service_restriction TEXT,
            decision_account TEXT NOT NULL,
            end_date_account_restriction TEXT,
            account_type TEXT NOT NULL,
            decision_ground TEXT NOT NULL,
            decision_ground_reference_url TEXT NOT NULL,
            illegal_content_legal_ground TEXT NOT NULL,
            illegal_content_explanation TEXT NOT NULL,
            incompatible_content_ground TEXT NOT NULL,
            incompatible_content_explanation TEXT NOT NULL,
            incompatible_content_illegal INTEGER,
            category TEXT NOT NULL,
            category_addition TEXT NOT NULL,
            category_specification TEXT NOT NULL,
            category_specification_other TEXT NOT NULL,
            content_type TEXT NOT NULL,
            content_type_other TEXT NOT NULL,
            content_language TEXT NOT NULL,
            content_date TEXT,
            territorial_scope TEXT NOT NULL,
            application_date TEXT,
            decision_facts TEXT NOT NULL,
            source_type TEXT NOT NULL,
            source_identity TEXT NOT NULL,
            automated_detection INTEGER,
            automated_decision TEXT NOT NULL,
            platform_name TEXT NOT NULL,
            platform_uid TEXT NOT NULL,
            created_at TEXT NOT NULL,
            uid_time TEXT NOT NULL,
            uid_entity_id TEXT NOT NULL,
            uid_entity_type TEXT NOT NULL,
            ingested_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_decisions_uid_entity_id ON decisions(uid_entity_id);",
    )?;
    Ok(())
}

impl DecisionStore for SqliteStore {
    fn write_chunk(&self, chunk: &[Decision], mode: WriteMode) -> Result<()> {
        let sql = match mode {
            WriteMode::Insert => &self.insert_sql,
            WriteMode::Upsert => &self.upsert_sql,
        };
        let ingested_at = Utc::now().to_rfc3339();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(sql)?;
            for d in chunk {
                stmt.execute(params![
                    d.id,
                    tags(&d.decision_visibility)?,
                    d.decision_visibility_other,
                    opt_ts(&d.end_date_visibility_restriction),
                    tags(&d.decision_monetary)?,
                    d.decision_monetary_other,
                    opt_ts(&d.end_date_monetary_restriction),
                    tags(&d.decision_provision)?,
                    opt_ts(&d.end_date_service_restriction),
                    tags(&d.decision_account)?,
                    opt_ts(&d.end_date_account_restriction),
                    d.account_type,
                    d.decision_ground,
                    d.decision_ground_reference_url,
                    d.illegal_content_legal_ground,
                    d.illegal_content_explanation,
                    d.incompatible_content_ground,
                    d.incompatible_content_explanation,
                    d.incompatible_content_illegal,
                    d.category,
                    d.category_addition,
                    tags(&d.category_specification)?,
                    d.category_specification_other,
                    tags(&d.content_type)?,
                    d.content_type_other,
                    d.content_language,
                    opt_ts(&d.content_date),
                    tags(&d.territorial_scope)?,
                    opt_ts(&d.application_date),
                    d.decision_facts,
                    d.source_type,
                    d.source_identity,
                    d.automated_detection,
                    d.automated_decision,
                    d.platform_name,
                    d.platform_uid,
                    d.created_at.to_rfc3339(),
                    d.uid_time.to_rfc3339(),
                    d.uid_entity_id,
                    d.uid_entity_type,
                    ingested_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM decisions", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    fn load(&self, id: &str) -> Result<Option<Decision>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            COLUMNS.join(", "),
            DECISIONS_TABLE
        );
        let decision = conn.query_row(&sql, [id], decode_row).optional()?;
        Ok(decision)
    }

    fn size_bytes(&self) -> Result<Option<u64>> {
        let conn = self.lock()?;
        let size: i64 = conn.query_row(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
            [],
            |row| row.get(0),
        )?;
        Ok(Some(size as u64))
    }
}

fn tags(values: &[String]) -> Result<String> {
    Ok(serde_json::to_string(values)?)
}

fn opt_ts(value: &Option<DateTime<Utc>>) -> Option<String> {
    value.map(|ts| ts.to_rfc3339())
}

fn decode_row(row: &Row<'_>) -> rusqlite::Result<Decision> {
    fn text(row: &Row<'_>, column: &str) -> rusqlite::Result<String> {
        row.get(column)
    }
    fn tag_list(row: &Row<'_>, column: &str) -> rusqlite::Result<Vec<String>> {
        let raw: String = row.get(column)?;
        serde_json::from_str(&raw).map_err(|e| conversion_error(column, e))
    }
    fn ts(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
        let raw: String = row.get(column)?;
        parse_rfc3339(column, &raw)
    }
    fn opt_ts(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = row.get(column)?;
        raw.map(|r| parse_rfc3339(column, &r)).transpose()
    }

    Ok(Decision {
        id: text(row, "id")?,
        decision_visibility: tag_list(row, "decision_visibility")?,
        decision_visibility_other: text(row, "decision_visibility_other")?,
        end_date_visibility_restriction: opt_ts(row, "end_date_visibility_restriction")?,
        decision_monetary: tag_list(row, "decision_monetary")?,
        decision_monetary_other: text(row, "decision_monetary_other")?,
        end_date_monetary_restriction: opt_ts(row, "end_date_monetary_restriction")?,
        decision_provision: tag_list(row, "decision_provision")?,
        end_date_service_restriction: opt_ts(row, "end_date_service_restriction")?,
        decision_account: tag_list(row, "decision_account")?,
        end_date_account_restriction: opt_ts(row, "end_date_account_restriction")?,
        account_type: text(row, "account_type")?,
        decision_ground: text(row, "decision_ground")?,
        decision_ground_reference_url: text(row, "decision_ground_reference_url")?,
        illegal_content_legal_ground: text(row, "illegal_content_legal_ground")?,
        illegal_content_explanation: text(row, "illegal_content_explanation")?,
        incompatible_content_ground: text(row, "incompatible_content_ground")?,
        incompatible_content_explanation: text(row, "incompatible_content_explanation")?,
        incompatible_content_illegal: row.get("incompatible_content_illegal")?,
        category: text(row, "category")?,
        category_addition: text(row, "category_addition")?,
        category_specification: tag_list(row, "category_specification")?,
        category_specification_other: text(row, "category_specification_other")?,
        content_type: tag_list(row, "content_type")?,
        content_type_other: text(row, "content_type_other")?,
        content_language: text(row, "content_language")?,
        content_date: opt_ts(row, "content_date")?,
        territorial_scope: tag_list(row, "territorial_scope")?,
        application_date: opt_ts(row, "application_date")?,
        decision_facts: text(row, "decision_facts")?,
        source_type: text(row, "source_type")?,
        source_identity: text(row, "source_identity")?,
        automated_detection: row.get("automated_detection")?,
        automated_decision: text(row, "automated_decision")?,
        platform_name: text(row, "platform_name")?,
        platform_uid: text(row, "platform_uid")?,
        created_at: ts(row, "created_at")?,
        uid_time: ts(row, "uid_time")?,
        uid_entity_id: text(row, "uid_entity_id")?,
        uid_entity_type: text(row, "uid_entity_type")?,
    })
}

fn parse_rfc3339(column: &str, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

fn conversion_error<E>(column: &str, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let index = COLUMNS.iter().position(|c| *c == column).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && (failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE)
        }
        _ => false,
    }
}

// Implement From for rusqlite::Error
impl From<rusqlite::Error> for SorloadError {
    fn from(e: rusqlite::Error) -> Self {
        if is_unique_violation(&e) {
            SorloadError::DuplicateKey(e.to_string())
        } else {
            SorloadError::Storage(format!("SQLite error: {}", e))
        }
    }
}
