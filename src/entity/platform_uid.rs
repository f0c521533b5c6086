//! Decoder for the composite `platform_uid` field.
//!
//! Identifiers look like `<snowflake>-<entity id>-<entity type>`. The
//! snowflake's high bits hold milliseconds elapsed since a custom epoch.

use chrono::{DateTime, Utc};

use super::zero_timestamp;

/// Custom epoch of the snowflake scheme (2015-01-01T00:00:00Z), in Unix milliseconds.
pub const SNOWFLAKE_EPOCH_MS: i64 = 1_420_070_400_000;

/// Number of low bits in a snowflake that carry worker/sequence data.
const TIMESTAMP_SHIFT: u32 = 22;

/// The three pieces of information packed into a `platform_uid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformUid {
    pub timestamp: DateTime<Utc>,
    pub entity_id: String,
    pub entity_type: String,
}

impl Default for PlatformUid {
    fn default() -> Self {
        Self {
            timestamp: zero_timestamp(),
            entity_id: String::new(),
            entity_type: String::new(),
        }
    }
}

impl PlatformUid {
    /// Decode a composite identifier. Never fails: malformed input degrades
    /// to the zero timestamp and, with fewer than three segments, empty ids.
    pub fn decode(raw: &str) -> Self {
        let parts: Vec<&str> = raw.split('-').collect();
        if parts.len() < 3 {
            return Self::default();
        }

        let timestamp = parts[0]
            .parse::<i64>()
            .ok()
            .and_then(snowflake_time)
            .unwrap_or_else(zero_timestamp);

        Self {
            timestamp,
            entity_id: parts[1].to_string(),
            entity_type: parts[2].to_string(),
        }
    }
}

/// Convert a snowflake to the instant encoded in its high bits.
pub fn snowflake_time(snowflake: i64) -> Option<DateTime<Utc>> {
    let ms = (snowflake >> TIMESTAMP_SHIFT) + SNOWFLAKE_EPOCH_MS;
    DateTime::from_timestamp_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decode_valid_uid() {
        // 175928847299117063 >> 22 = 41944705796 ms after the custom epoch
        let uid = PlatformUid::decode("175928847299117063-1234-message");
        let expected = Utc.timestamp_millis_opt(SNOWFLAKE_EPOCH_MS + 41_944_705_796).unwrap();
        assert_eq!(uid.timestamp, expected);
        assert_eq!(uid.entity_id, "1234");
        assert_eq!(uid.entity_type, "message");
    }

    #[test]
    fn test_decode_is_never_before_custom_epoch() {
        let epoch = Utc.timestamp_millis_opt(SNOWFLAKE_EPOCH_MS).unwrap();
        for snowflake in [0_i64, 1, 4_194_303, 4_194_304, 1_300_000_000_000_000_000, i64::MAX] {
            let uid = PlatformUid::decode(&format!("{}-id-type", snowflake));
            assert!(uid.timestamp >= epoch, "snowflake {} decoded before epoch", snowflake);
            assert_eq!(uid.entity_id, "id");
            assert_eq!(uid.entity_type, "type");
        }
    }

    #[test]
    fn test_decode_zero_snowflake_is_epoch() {
        let uid = PlatformUid::decode("0-a-b");
        assert_eq!(uid.timestamp.timestamp_millis(), SNOWFLAKE_EPOCH_MS);
    }

    #[test]
    fn test_decode_too_few_segments() {
        for raw in ["", "123", "123-456"] {
            let uid = PlatformUid::decode(raw);
            assert_eq!(uid, PlatformUid::default());
            assert_eq!(uid.timestamp, zero_timestamp());
            assert!(uid.entity_id.is_empty());
            assert!(uid.entity_type.is_empty());
        }
    }

    #[test]
    fn test_decode_unparsable_prefix_keeps_segments() {
        let uid = PlatformUid::decode("notanumber-42-user");
        assert_eq!(uid.timestamp, zero_timestamp());
        assert_eq!(uid.entity_id, "42");
        assert_eq!(uid.entity_type, "user");
    }

    #[test]
    fn test_decode_ignores_extra_segments() {
        let uid = PlatformUid::decode("4194304-42-guild-extra-bits");
        assert_eq!(uid.timestamp.timestamp_millis(), SNOWFLAKE_EPOCH_MS + 1);
        assert_eq!(uid.entity_id, "42");
        assert_eq!(uid.entity_type, "guild");
    }
}
