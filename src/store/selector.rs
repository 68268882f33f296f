use super::timestamp::Timestamp;
use crate::error::{StoreError, StoreResult};

/// How to pick one snapshot out of a repository's history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupSelector {
    /// Restrict the search to this branch
    pub branch: Option<String>,
    /// Exact timestamp or `YYYYMMDD` day
    pub date: Option<String>,
    /// Newest snapshot regardless of `date`
    pub latest: bool,
}

impl BackupSelector {
    pub fn newest() -> Self {
        Self::default()
    }

    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn latest(mut self, latest: bool) -> Self {
        self.latest = latest;
        self
    }

    pub(crate) fn date_filter(&self) -> StoreResult<Option<DateFilter>> {
        if self.latest {
            return Ok(None);
        }
        self.date.as_deref().map(DateFilter::parse).transpose()
    }
}

/// Parsed `date` selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DateFilter {
    Exact(Timestamp),
    Day(String),
}

impl DateFilter {
    fn parse(raw: &str) -> StoreResult<Self> {
        let raw = raw.trim();
        if let Some(ts) = Timestamp::parse(raw) {
            return Ok(DateFilter::Exact(ts));
        }
        if raw.len() == Timestamp::DATE_LEN
            && chrono::NaiveDate::parse_from_str(raw, "%Y%m%d").is_ok()
        {
            return Ok(DateFilter::Day(raw.to_string()));
        }
        Err(StoreError::InvalidSelector(format!(
            "'{raw}' is neither YYYYMMDD-HHMMSS nor YYYYMMDD"
        )))
    }

    pub(crate) fn matches(&self, ts: &Timestamp) -> bool {
        match self {
            DateFilter::Exact(exact) => exact == ts,
            DateFilter::Day(day) => ts.date() == day,
        }
    }
}
