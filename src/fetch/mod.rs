//! HTTP download of dump archives.

mod backoff;

pub use backoff::{retry, Attempt, BackoffPolicy};

use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SorloadError};

/// Configuration for the fetcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    /// Per-request timeout, covering the whole body download
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub backoff: BackoffPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("sorload/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 600,
            connect_timeout_secs: 30,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Statuses that mean the dump does not exist. S3 answers 403 for missing keys.
pub fn is_permanent_status(status: StatusCode) -> bool {
    status == StatusCode::FORBIDDEN || status == StatusCode::NOT_FOUND
}

/// Downloads whole response bodies, retrying transient failures.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    backoff: BackoffPolicy,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        config.backoff.validate()?;
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            backoff: config.backoff.clone(),
        })
    }

    /// Download `url`, retrying with backoff until success, a 403/404, or
    /// the backoff policy gives up.
    pub async fn fetch(&self, url: &str) -> Result<Bytes> {
        info!(url = %url, "Downloading");
        let result = retry(&self.backoff, |_| self.attempt(url)).await;
        if let Err(e) = &result {
            if e.is_permanent() {
                warn!(url = %url, error = %e, "Dump not available");
            }
        }
        result
    }

    async fn attempt(&self, url: &str) -> Attempt<Bytes> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(e.into()),
        };

        let status = response.status();
        if is_permanent_status(status) {
            return Attempt::Permanent(SorloadError::PermanentFetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Attempt::Retry(SorloadError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        match response.bytes().await {
            Ok(body) => Attempt::Success(body),
            Err(e) => Attempt::Retry(e.into()),
        }
    }
}
