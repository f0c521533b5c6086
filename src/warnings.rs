//! Advisory warnings printed before an import starts.
//!
//! None of these stop a run; they point out settings that are likely to
//! produce a lot of failed URLs or to change existing rows.

use chrono::NaiveDate;

use crate::persist::DuplicatePolicy;
use crate::pipeline::DateRange;

/// First day for which the transparency database published a dump.
pub fn first_dump_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 8, 21).unwrap_or_default()
}

/// A warning about the requested run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The range starts before the first published dump.
    BeforeFirstDump { from: NaiveDate, first: NaiveDate },
    /// The range ends today or later; those dumps are not published yet.
    NotYetPublished { to: NaiveDate, today: NaiveDate },
    /// Existing rows with the same id will be replaced.
    OverwriteEnabled { policy: DuplicatePolicy },
}

/// Check the run parameters and return any warnings.
///
/// # Arguments
/// * `range` - Validated date range of the run
/// * `today` - Current date, passed in for testability
/// * `policy` - Duplicate handling for the run
pub fn check_run(range: &DateRange, today: NaiveDate, policy: DuplicatePolicy) -> Vec<Warning> {
    let mut warnings = Vec::new();

    let first = first_dump_date();
    if range.start() < first {
        warnings.push(Warning::BeforeFirstDump {
            from: range.start(),
            first,
        });
    }

    if range.end() >= today {
        warnings.push(Warning::NotYetPublished {
            to: range.end(),
            today,
        });
    }

    if policy != DuplicatePolicy::Reject {
        warnings.push(Warning::OverwriteEnabled { policy });
    }

    warnings
}

/// Format a warning for display.
pub fn format_warning(warning: &Warning) -> String {
    match warning {
        Warning::BeforeFirstDump { from, first } => format!(
            "Warning: --from {} is before the first published dump ({}); expect failed downloads",
            from, first
        ),
        Warning::NotYetPublished { to, today } => format!(
            "Warning: --to {} is not before today ({}); recent dumps may not exist yet",
            to, today
        ),
        Warning::OverwriteEnabled { policy } => format!(
            "Warning: duplicate policy '{}' replaces existing rows with the same id",
            policy
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn range(from: &str, to: &str) -> DateRange {
        DateRange::new(date(from), date(to)).unwrap()
    }

    #[test]
    fn test_no_warnings_for_past_range() {
        let warnings = check_run(
            &range("2024-12-28", "2024-12-29"),
            date("2025-01-15"),
            DuplicatePolicy::Reject,
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_before_first_dump() {
        let warnings = check_run(
            &range("2024-08-01", "2024-08-30"),
            date("2025-01-15"),
            DuplicatePolicy::Reject,
        );
        assert_eq!(warnings.len(), 1);
        match &warnings[0] {
            Warning::BeforeFirstDump { from, first } => {
                assert_eq!(*from, date("2024-08-01"));
                assert_eq!(*first, date("2024-08-21"));
            }
            _ => panic!("Expected BeforeFirstDump warning"),
        }
    }

    #[test]
    fn test_range_ending_today() {
        let warnings = check_run(
            &range("2025-01-10", "2025-01-15"),
            date("2025-01-15"),
            DuplicatePolicy::Reject,
        );
        assert_eq!(
            warnings,
            vec![Warning::NotYetPublished {
                to: date("2025-01-15"),
                today: date("2025-01-15"),
            }]
        );
    }

    #[test]
    fn test_overwrite_policies_warn() {
        for policy in [DuplicatePolicy::Overwrite, DuplicatePolicy::AlwaysOverwrite] {
            let warnings = check_run(&range("2024-12-28", "2024-12-28"), date("2025-01-15"), policy);
            assert_eq!(warnings, vec![Warning::OverwriteEnabled { policy }]);
        }
    }

    #[test]
    fn test_multiple_warnings() {
        let warnings = check_run(
            &range("2024-01-01", "2030-01-01"),
            date("2025-01-15"),
            DuplicatePolicy::Overwrite,
        );
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn test_format_messages() {
        let msg = format_warning(&Warning::BeforeFirstDump {
            from: date("2024-08-01"),
            first: date("2024-08-21"),
        });
        assert!(msg.contains("2024-08-01"));
        assert!(msg.contains("2024-08-21"));

        let msg = format_warning(&Warning::OverwriteEnabled {
            policy: DuplicatePolicy::AlwaysOverwrite,
        });
        assert!(msg.contains("always-overwrite"));
    }
}
