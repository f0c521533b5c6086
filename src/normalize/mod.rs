//! Row normalization: raw CSV rows in, typed [`Decision`]s out.

mod fields;

pub use fields::{parse_tags, parse_timestamp, parse_tristate, TIMESTAMP_FORMAT};

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::entity::{zero_timestamp, Decision, PlatformUid};
use crate::error::Result;

/// Column holding the primary identifier.
pub const ID_COLUMN: &str = "uuid";

/// Maps header names to column positions.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        let positions = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let name = h.as_ref();
                let name = if i == 0 {
                    name.trim_start_matches('\u{feff}')
                } else {
                    name
                };
                (name.to_string(), i)
            })
            .collect();
        Self { positions }
    }

    /// Look up a column in a row. Unknown columns and short rows yield "".
    pub fn get<'a, S: AsRef<str>>(&self, row: &'a [S], column: &str) -> &'a str {
        self.positions
            .get(column)
            .and_then(|&i| row.get(i))
            .map(|v| v.as_ref())
            .unwrap_or("")
    }
}

/// Something noteworthy about a row that did not stop it from normalizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowWarning {
    /// The `uuid` column was empty.
    MissingId,
    /// `created_at` was empty or malformed; the sentinel was used.
    SentinelCreatedAt,
}

/// Result of normalizing one row.
#[derive(Debug, Clone)]
pub struct NormalizedRow {
    pub decision: Decision,
    pub warnings: Vec<RowWarning>,
}

impl NormalizedRow {
    pub fn has_warning(&self, warning: RowWarning) -> bool {
        self.warnings.contains(&warning)
    }
}

/// Build a decision from one row. Never fails.
pub fn normalize_row<S: AsRef<str>>(headers: &HeaderIndex, row: &[S]) -> NormalizedRow {
    let get = |column: &str| headers.get(row, column);
    let text = |column: &str| get(column).to_string();

    let mut warnings = Vec::new();

    let id = text(ID_COLUMN);
    if id.is_empty() {
        warnings.push(RowWarning::MissingId);
    }

    let created_at = match parse_timestamp(get("created_at")) {
        Some(ts) => ts,
        None => {
            warnings.push(RowWarning::SentinelCreatedAt);
            zero_timestamp()
        }
    };

    let platform_uid = text("platform_uid");
    let decoded = PlatformUid::decode(&platform_uid);

    let decision = Decision {
        id,
        decision_visibility: parse_tags(get("decision_visibility")),
        decision_visibility_other: text("decision_visibility_other"),
        end_date_visibility_restriction: parse_timestamp(get("end_date_visibility_restriction")),
        decision_monetary: parse_tags(get("decision_monetary")),
        decision_monetary_other: text("decision_monetary_other"),
        end_date_monetary_restriction: parse_timestamp(get("end_date_monetary_restriction")),
        decision_provision: parse_tags(get("decision_provision")),
        end_date_service_restriction: parse_timestamp(get("end_date_service_restriction")),
        decision_account: parse_tags(get("decision_account")),
        end_date_account_restriction: parse_timestamp(get("end_date_account_restriction")),
        account_type: text("account_type"),
        decision_ground: text("decision_ground"),
        decision_ground_reference_url: text("decision_ground_reference_url"),
        illegal_content_legal_ground: text("illegal_content_legal_ground"),
        illegal_content_explanation: text("illegal_content_explanation"),
        incompatible_content_ground: text("incompatible_content_ground"),
        incompatible_content_explanation: text("incompatible_content_explanation"),
        incompatible_content_illegal: parse_tristate(get("incompatible_content_illegal")),
        category: text("category"),
        category_addition: text("category_addition"),
        category_specification: parse_tags(get("category_specification")),
        category_specification_other: text("category_specification_other"),
        content_type: parse_tags(get("content_type")),
        content_type_other: text("content_type_other"),
        content_language: text("content_language"),
        content_date: parse_timestamp(get("content_date")),
        territorial_scope: parse_tags(get("territorial_scope")),
        application_date: parse_timestamp(get("application_date")),
        decision_facts: text("decision_facts"),
        source_type: text("source_type"),
        source_identity: text("source_identity"),
        automated_detection: parse_tristate(get("automated_detection")),
        automated_decision: text("automated_decision"),
        platform_name: text("platform_name"),
        platform_uid,
        created_at,
        uid_time: decoded.timestamp,
        uid_entity_id: decoded.entity_id,
        uid_entity_type: decoded.entity_type,
    };

    NormalizedRow { decision, warnings }
}

/// Decisions parsed from one or more tables.
#[derive(Debug, Default)]
pub struct ParsedTable {
    pub decisions: Vec<Decision>,
    /// Rows dropped because they had no id.
    pub skipped: usize,
}

impl ParsedTable {
    fn merge(&mut self, other: ParsedTable) {
        self.decisions.extend(other.decisions);
        self.skipped += other.skipped;
    }
}

/// Parse one CSV table (header row first, ragged rows allowed).
pub fn parse_table(data: &[u8]) -> Result<ParsedTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut records = reader.byte_records();
    let headers = match records.next() {
        Some(record) => HeaderIndex::new(&lossy_fields(&record?)),
        None => return Ok(ParsedTable::default()),
    };

    let mut parsed = ParsedTable::default();
    for (line, record) in records.enumerate() {
        let row = lossy_fields(&record?);
        let normalized = normalize_row(&headers, &row);

        if normalized.has_warning(RowWarning::MissingId) {
            warn!(row = line + 1, "Skipping row without uuid");
            parsed.skipped += 1;
            continue;
        }
        if normalized.has_warning(RowWarning::SentinelCreatedAt) {
            debug!(id = %normalized.decision.id, "created_at missing or malformed, using sentinel");
        }
        parsed.decisions.push(normalized.decision);
    }

    Ok(parsed)
}

/// Parse every extracted table. A table that fails to parse is logged and
/// skipped; the others are still returned.
pub fn parse_tables(tables: &[Vec<u8>]) -> ParsedTable {
    let mut all = ParsedTable::default();
    for (i, table) in tables.iter().enumerate() {
        match parse_table(table) {
            Ok(parsed) => all.merge(parsed),
            Err(e) => warn!(table = i, error = %e, "Skipping unreadable table"),
        }
    }
    all
}

fn lossy_fields(record: &csv::ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SNOWFLAKE_EPOCH_MS;

    fn headers(names: &[&str]) -> HeaderIndex {
        HeaderIndex::new(names)
    }

    #[test]
    fn test_ragged_row_yields_empty_strings() {
        let h = headers(&["uuid", "category", "platform_name"]);
        let row = ["abc"];
        assert_eq!(h.get(&row, "uuid"), "abc");
        assert_eq!(h.get(&row, "category"), "");
        assert_eq!(h.get(&row, "not_a_column"), "");
    }

    #[test]
    fn test_bom_stripped_from_first_header() {
        let h = headers(&["\u{feff}uuid", "category"]);
        assert_eq!(h.get(&["abc", "X"], "uuid"), "abc");
    }

    #[test]
    fn test_normalize_full_row() {
        let h = headers(&[
            "uuid",
            "decision_visibility",
            "end_date_visibility_restriction",
            "automated_detection",
            "incompatible_content_illegal",
            "territorial_scope",
            "platform_uid",
            "created_at",
        ]);
        let row = [
            "11111111-2222-3333-4444-555555555555",
            r#"["DECISION_VISIBILITY_CONTENT_REMOVED","DECISION_VISIBILITY_OTHER"]"#,
            "2025-01-01 00:00:00",
            "Yes",
            "",
            "EU",
            "4194304-987-message",
            "2024-12-28 10:00:00",
        ];

        let normalized = normalize_row(&h, &row);
        assert!(normalized.warnings.is_empty());

        let d = normalized.decision;
        assert_eq!(d.id, "11111111-2222-3333-4444-555555555555");
        assert_eq!(
            d.decision_visibility,
            vec!["DECISION_VISIBILITY_CONTENT_REMOVED", "DECISION_VISIBILITY_OTHER"]
        );
        assert!(d.end_date_visibility_restriction.is_some());
        assert_eq!(d.automated_detection, Some(true));
        assert_eq!(d.incompatible_content_illegal, None);
        assert_eq!(d.territorial_scope, vec!["EU"]);
        assert_eq!(d.uid_entity_id, "987");
        assert_eq!(d.uid_entity_type, "message");
        assert_eq!(d.uid_time.timestamp_millis(), SNOWFLAKE_EPOCH_MS + 1);
        assert!(!d.has_sentinel_created_at());
    }

    #[test]
    fn test_missing_id_and_created_at_are_warnings() {
        let h = headers(&["uuid", "created_at"]);
        let normalized = normalize_row(&h, &["", "not a date"]);
        assert!(normalized.has_warning(RowWarning::MissingId));
        assert!(normalized.has_warning(RowWarning::SentinelCreatedAt));
        assert!(normalized.decision.has_sentinel_created_at());
    }

    #[test]
    fn test_derived_fields_round_trip() {
        let original = Decision::new("id-1").with_platform_uid("175928847299117063-555-user");
        let h = headers(&["uuid", "platform_uid"]);
        let row = [original.id.clone(), original.platform_uid.clone()];

        let d = normalize_row(&h, &row).decision;
        assert_eq!(d.uid_time, original.uid_time);
        assert_eq!(d.uid_entity_id, original.uid_entity_id);
        assert_eq!(d.uid_entity_type, original.uid_entity_type);
    }

    #[test]
    fn test_parse_table_skips_rows_without_id() {
        let csv = "uuid,category,created_at\n\
                   a,STATEMENT_CATEGORY_SCAMS,2024-12-28 00:00:01\n\
                   ,STATEMENT_CATEGORY_SCAMS,2024-12-28 00:00:02\n\
                   b\n";
        let parsed = parse_table(csv.as_bytes()).unwrap();
        assert_eq!(parsed.skipped, 1);
        let ids: Vec<_> = parsed.decisions.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(parsed.decisions[1].category, "");
        assert!(parsed.decisions[1].has_sentinel_created_at());
    }

    #[test]
    fn test_parse_table_quoted_tag_list() {
        let csv = "uuid,content_type\n\
                   a,\"[\"\"CONTENT_TYPE_TEXT\"\",\"\"CONTENT_TYPE_IMAGE\"\"]\"\n\
                   b,foo\n";
        let parsed = parse_table(csv.as_bytes()).unwrap();
        assert_eq!(
            parsed.decisions[0].content_type,
            vec!["CONTENT_TYPE_TEXT", "CONTENT_TYPE_IMAGE"]
        );
        assert_eq!(parsed.decisions[1].content_type, vec!["foo"]);
    }

    #[test]
    fn test_parse_table_empty_input() {
        let parsed = parse_table(b"").unwrap();
        assert!(parsed.decisions.is_empty());
        assert_eq!(parsed.skipped, 0);
    }

    #[test]
    fn test_parse_tables_merges() {
        let tables = vec![b"uuid\na\nb\n".to_vec(), b"uuid\nc\n\n".to_vec()];
        let parsed = parse_tables(&tables);
        assert_eq!(parsed.decisions.len(), 3);
    }
}
