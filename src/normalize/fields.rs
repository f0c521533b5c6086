//! Total field parsers. None of these can fail; bad input degrades to an
//! empty, absent or unknown value.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Timestamp layout used by every date column in the dumps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Decode a category-tag cell.
///
/// Accepts a JSON string list (`["a","b"]`). Anything else that is not empty
/// is kept whole as a single tag.
pub fn parse_tags(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<String>>(value) {
        Ok(tags) => tags,
        Err(_) => vec![value.to_string()],
    }
}

/// Parse a `YYYY-MM-DD HH:MM:SS` cell as UTC. Empty or malformed cells are absent.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// `yes`/`no` in any case map to a known value; everything else is unknown.
pub fn parse_tristate(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("yes") {
        Some(true)
    } else if value.eq_ignore_ascii_case("no") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_tags_empty() {
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn test_tags_structured_list() {
        assert_eq!(parse_tags(r#"["a","b"]"#), vec!["a", "b"]);
        assert!(parse_tags("[]").is_empty());
    }

    #[test]
    fn test_tags_bare_scalar_kept_whole() {
        assert_eq!(parse_tags("foo"), vec!["foo"]);
        assert_eq!(parse_tags("[broken"), vec!["[broken"]);
        // a list of non-strings is not a tag list either
        assert_eq!(parse_tags("[1,2]"), vec!["[1,2]"]);
    }

    #[test]
    fn test_timestamp_valid() {
        let ts = parse_timestamp("2024-12-28 13:45:07").unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 12, 28));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (13, 45, 7));
    }

    #[test]
    fn test_timestamp_lenient() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("2024-12-28").is_none());
        assert!(parse_timestamp("2024-13-01 00:00:00").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_tristate() {
        assert_eq!(parse_tristate("Yes"), Some(true));
        assert_eq!(parse_tristate("YES"), Some(true));
        assert_eq!(parse_tristate("no"), Some(false));
        assert_eq!(parse_tristate("No"), Some(false));
        assert_eq!(parse_tristate(""), None);
        assert_eq!(parse_tristate("maybe"), None);
        assert_ne!(parse_tristate(""), Some(false));
    }
}
