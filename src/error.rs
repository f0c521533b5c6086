use thiserror::Error;

#[derive(Error, Debug)]
pub enum SorloadError {
    #[error("Permanent fetch failure for {url}: HTTP {status}")]
    PermanentFetch { url: String, status: u16 },

    #[error("Bad status for {url}: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        source: Box<SorloadError>,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid date range: --from {from} must not be after --to {to}")]
    InvalidDateRange { from: String, to: String },

    #[error("Worker task failed: {0}")]
    Join(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SorloadError {
    /// True when the storage layer rejected a row for an already-present id.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, SorloadError::DuplicateKey(_))
    }

    /// True for fetch failures that no amount of retrying will fix.
    pub fn is_permanent(&self) -> bool {
        matches!(self, SorloadError::PermanentFetch { .. })
    }
}

impl From<reqwest::Error> for SorloadError {
    fn from(e: reqwest::Error) -> Self {
        SorloadError::Network(e.to_string())
    }
}

impl From<zip::result::ZipError> for SorloadError {
    fn from(e: zip::result::ZipError) -> Self {
        SorloadError::Archive(e.to_string())
    }
}

impl From<csv::Error> for SorloadError {
    fn from(e: csv::Error) -> Self {
        SorloadError::Csv(e.to_string())
    }
}

impl From<tokio::task::JoinError> for SorloadError {
    fn from(e: tokio::task::JoinError) -> Self {
        SorloadError::Join(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SorloadError>;
