// List query parameters and the filters they drive.

use axum::extract::{Query, rejection::QueryRejection};
use serde::Deserialize;

use super::ApiError;
use crate::sources::{Located, NewsItem};

/// Largest accepted `limit`.
pub const MAX_LIMIT: usize = 1000;

/// Raw query string. Kept as strings so bad values produce our own 400 body.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<String>,
    pub source: Option<String>,
    pub alerts: Option<String>,
    pub mapped: Option<String>,
    pub refresh: Option<String>,
}

/// Validated list options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: Option<usize>,
    pub source: Option<String>,
    pub alerts_only: bool,
    pub mapped_only: bool,
    pub refresh: bool,
}

impl TryFrom<ListParams> for ListOptions {
    type Error = ApiError;

    fn try_from(params: ListParams) -> Result<Self, ApiError> {
        Ok(Self {
            limit: params.limit.as_deref().map(parse_limit).transpose()?,
            source: params.source.filter(|s| !s.is_empty()),
            alerts_only: parse_flag("alerts", params.alerts.as_deref())?,
            mapped_only: parse_flag("mapped", params.mapped.as_deref())?,
            refresh: parse_flag("refresh", params.refresh.as_deref())?,
        })
    }
}

impl ListOptions {
    /// Validate an extracted query string, turning extractor rejections into 400s.
    pub fn from_query(
        query: Result<Query<ListParams>, QueryRejection>,
    ) -> Result<Self, ApiError> {
        let Query(params) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Self::try_from(params)
    }
}

fn parse_limit(raw: &str) -> Result<usize, ApiError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if (1..=MAX_LIMIT).contains(&n) => Ok(n),
        _ => Err(ApiError::BadRequest(format!(
            "limit must be an integer between 1 and {MAX_LIMIT}, got {raw:?}"
        ))),
    }
}

fn parse_flag(name: &str, raw: Option<&str>) -> Result<bool, ApiError> {
    let Some(raw) = raw else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(ApiError::BadRequest(format!(
            "{name} must be true or false, got {raw:?}"
        ))),
    }
}

impl ListOptions {
    /// Source match, then alerts only, then limit.
    pub fn apply_news(&self, mut items: Vec<NewsItem>) -> Vec<NewsItem> {
        if let Some(source) = &self.source {
            items.retain(|item| &item.source == source);
        }
        if self.alerts_only {
            items.retain(|item| item.is_alert);
        }
        self.truncate(items)
    }

    /// Mapped only, then limit.
    pub fn apply_located<T: Located>(&self, mut records: Vec<T>) -> Vec<T> {
        if self.mapped_only {
            records.retain(|record| record.has_location());
        }
        self.truncate(records)
    }

    fn truncate<T>(&self, mut records: Vec<T>) -> Vec<T> {
        if let Some(limit) = self.limit {
            records.truncate(limit);
        }
        records
    }
}
