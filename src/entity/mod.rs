mod platform_uid;

pub use platform_uid::{snowflake_time, PlatformUid, SNOWFLAKE_EPOCH_MS};

use chrono::{DateTime, Utc};

/// Sentinel used wherever a required timestamp could not be decoded.
pub fn zero_timestamp() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// One statement of reasons, as published in the daily dumps.
///
/// Instances are built once by the normalizer and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub id: String,

    pub decision_visibility: Vec<String>,
    pub decision_visibility_other: String,
    pub end_date_visibility_restriction: Option<DateTime<Utc>>,
    pub decision_monetary: Vec<String>,
    pub decision_monetary_other: String,
    pub end_date_monetary_restriction: Option<DateTime<Utc>>,
    pub decision_provision: Vec<String>,
    pub end_date_service_restriction: Option<DateTime<Utc>>,
    pub decision_account: Vec<String>,
    pub end_date_account_restriction: Option<DateTime<Utc>>,
    pub account_type: String,

    pub decision_ground: String,
    pub decision_ground_reference_url: String,
    pub illegal_content_legal_ground: String,
    pub illegal_content_explanation: String,
    pub incompatible_content_ground: String,
    pub incompatible_content_explanation: String,
    pub incompatible_content_illegal: Option<bool>,

    pub category: String,
    pub category_addition: String,
    pub category_specification: Vec<String>,
    pub category_specification_other: String,
    pub content_type: Vec<String>,
    pub content_type_other: String,
    pub content_language: String,
    pub content_date: Option<DateTime<Utc>>,
    pub territorial_scope: Vec<String>,
    pub application_date: Option<DateTime<Utc>>,
    pub decision_facts: String,
    pub source_type: String,
    pub source_identity: String,
    pub automated_detection: Option<bool>,
    pub automated_decision: String,
    pub platform_name: String,

    pub platform_uid: String,
    pub created_at: DateTime<Utc>,

    // Decoded from `platform_uid`
    pub uid_time: DateTime<Utc>,
    pub uid_entity_id: String,
    pub uid_entity_type: String,
}

impl Decision {
    /// A decision with the given id and every other field empty.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            decision_visibility: Vec::new(),
            decision_visibility_other: String::new(),
            end_date_visibility_restriction: None,
            decision_monetary: Vec::new(),
            decision_monetary_other: String::new(),
            end_date_monetary_restriction: None,
            decision_provision: Vec::new(),
            end_date_service_restriction: None,
            decision_account: Vec::new(),
            end_date_account_restriction: None,
            account_type: String::new(),
            decision_ground: String::new(),
            decision_ground_reference_url: String::new(),
            illegal_content_legal_ground: String::new(),
            illegal_content_explanation: String::new(),
            incompatible_content_ground: String::new(),
            incompatible_content_explanation: String::new(),
            incompatible_content_illegal: None,
            category: String::new(),
            category_addition: String::new(),
            category_specification: Vec::new(),
            category_specification_other: String::new(),
            content_type: Vec::new(),
            content_type_other: String::new(),
            content_language: String::new(),
            content_date: None,
            territorial_scope: Vec::new(),
            application_date: None,
            decision_facts: String::new(),
            source_type: String::new(),
            source_identity: String::new(),
            automated_detection: None,
            automated_decision: String::new(),
            platform_name: String::new(),
            platform_uid: String::new(),
            created_at: zero_timestamp(),
            uid_time: zero_timestamp(),
            uid_entity_id: String::new(),
            uid_entity_type: String::new(),
        }
    }

    /// Set `platform_uid` and recompute the fields decoded from it.
    pub fn with_platform_uid(mut self, platform_uid: impl Into<String>) -> Self {
        self.platform_uid = platform_uid.into();
        let decoded = PlatformUid::decode(&self.platform_uid);
        self.uid_time = decoded.timestamp;
        self.uid_entity_id = decoded.entity_id;
        self.uid_entity_type = decoded.entity_type;
        self
    }

    /// True when `created_at` holds the zero sentinel rather than a parsed value.
    pub fn has_sentinel_created_at(&self) -> bool {
        self.created_at == zero_timestamp()
    }
}
