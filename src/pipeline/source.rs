use chrono::{Days, NaiveDate};

use crate::config::SourceConfig;
use crate::error::{Result, SorloadError};

/// Inclusive range of calendar days, guaranteed non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(SorloadError::InvalidDateRange {
                from: start.to_string(),
                to: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Every day in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        std::iter::successors(Some(self.start), |d| d.checked_add_days(Days::new(1)))
            .take_while(move |d| *d <= end)
    }

    pub fn day_count(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }
}

/// Maps a calendar day to the URL of that day's dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpSource {
    base_url: String,
    prefix: String,
}

impl DumpSource {
    pub fn new(base_url: impl Into<String>, prefix: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(config.base_url.clone(), config.prefix.clone())
    }

    /// `<base>/<prefix>-YYYY-MM-DD-full.zip`
    pub fn url_for(&self, date: NaiveDate) -> String {
        format!(
            "{}/{}-{}-full.zip",
            self.base_url,
            self.prefix,
            date.format("%Y-%m-%d")
        )
    }

    pub fn urls(&self, range: &DateRange) -> Vec<String> {
        range.days().map(|d| self.url_for(d)).collect()
    }
}

impl Default for DumpSource {
    fn default() -> Self {
        Self::from_config(&SourceConfig::default())
    }
}
