// Conflict and protest events.
// Tries an ordered list of providers: ACLED when credentials are configured, then UCDP.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::catalog::SourceUrls;
use crate::error::{MonitorError, Result};

use super::client::FeedClient;
use super::types::{ConflictEvent, lenient_f64, lenient_string, truncate_chars};
use super::{DataKind, Fetcher};

const MAX_NOTES_CHARS: usize = 500;
/// ACLED look-back window.
const ACLED_WINDOW_DAYS: i64 = 30;
const ACLED_LIMIT: &str = "500";
const ACLED_FIELDS: &str = "event_id_cnty|event_date|event_type|sub_event_type|\
                            country|admin1|latitude|longitude|fatalities|notes";
const UCDP_PAGE_SIZE: &str = "100";

/// API key and registered email for ACLED. Both are required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcledCredentials {
    pub api_key: String,
    pub email: String,
}

impl AcledCredentials {
    /// Build credentials only if both parts are non-blank.
    pub fn from_parts(api_key: Option<&str>, email: Option<&str>) -> Option<Self> {
        let api_key = api_key.map(str::trim).filter(|s| !s.is_empty())?;
        let email = email.map(str::trim).filter(|s| !s.is_empty())?;
        Some(Self {
            api_key: api_key.to_string(),
            email: email.to_string(),
        })
    }
}

/// One upstream able to produce conflict events.
#[async_trait]
pub trait ConflictProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, client: &FeedClient) -> Result<Vec<ConflictEvent>>;
}

// ACLED ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AcledResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AcledEvent {
    #[serde(default, deserialize_with = "lenient_string")]
    event_id_cnty: String,
    #[serde(default)]
    event_date: String,
    #[serde(default)]
    event_type: String,
    #[serde(default)]
    sub_event_type: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    admin1: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    fatalities: Option<f64>,
    #[serde(default)]
    notes: Option<String>,
}

impl From<AcledEvent> for ConflictEvent {
    fn from(ev: AcledEvent) -> Self {
        ConflictEvent {
            id: ev.event_id_cnty,
            date: ev.event_date,
            event_type: ev.event_type,
            sub_type: ev.sub_event_type,
            country: ev.country,
            region: ev.admin1,
            lat: ev.latitude.unwrap_or(0.0),
            lng: ev.longitude.unwrap_or(0.0),
            fatalities: ev.fatalities.unwrap_or(0.0).max(0.0) as u32,
            notes: truncate_chars(ev.notes.as_deref().unwrap_or(""), MAX_NOTES_CHARS),
            source: "ACLED".to_string(),
        }
    }
}

/// Keyed ACLED API.
pub struct AcledProvider {
    url: String,
    credentials: AcledCredentials,
}

impl AcledProvider {
    pub fn new(url: impl Into<String>, credentials: AcledCredentials) -> Self {
        Self {
            url: url.into(),
            credentials,
        }
    }
}

#[async_trait]
impl ConflictProvider for AcledProvider {
    fn name(&self) -> &'static str {
        "ACLED"
    }

    async fn fetch(&self, client: &FeedClient) -> Result<Vec<ConflictEvent>> {
        let date_from = (Utc::now() - Duration::days(ACLED_WINDOW_DAYS))
            .format("%Y-%m-%d")
            .to_string();
        let event_date = format!("{}|", date_from);
        let params = [
            ("key", self.credentials.api_key.as_str()),
            ("email", self.credentials.email.as_str()),
            ("event_date", event_date.as_str()),
            ("event_date_where", ">="),
            ("limit", ACLED_LIMIT),
            ("fields", ACLED_FIELDS),
        ];

        let response: AcledResponse = client.get_json(&self.url, &params).await?;
        Ok(map_records::<AcledEvent>(response.data, self.name()))
    }
}

// UCDP -----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UcdpResponse {
    #[serde(rename = "Result", default)]
    result: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct UcdpEvent {
    #[serde(default, deserialize_with = "lenient_string")]
    id: String,
    #[serde(default)]
    date_start: String,
    #[serde(default)]
    type_of_violence: Option<u8>,
    #[serde(default)]
    side_a: String,
    #[serde(default)]
    side_b: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    region: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    best: Option<f64>,
}

impl From<UcdpEvent> for ConflictEvent {
    fn from(ev: UcdpEvent) -> Self {
        let event_type = match ev.type_of_violence {
            Some(1) | None => "Battle",
            _ => "One-sided violence",
        };
        ConflictEvent {
            id: ev.id,
            date: ev.date_start,
            event_type: event_type.to_string(),
            notes: format!("{} vs {}", ev.side_a, ev.side_b),
            sub_type: ev.side_a,
            country: ev.country,
            region: ev.region,
            lat: ev.latitude.unwrap_or(0.0),
            lng: ev.longitude.unwrap_or(0.0),
            fatalities: ev.best.unwrap_or(0.0).max(0.0) as u32,
            source: "UCDP".to_string(),
        }
    }
}

/// Free UCDP georeferenced event dataset.
pub struct UcdpProvider {
    url: String,
}

impl UcdpProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl ConflictProvider for UcdpProvider {
    fn name(&self) -> &'static str {
        "UCDP"
    }

    async fn fetch(&self, client: &FeedClient) -> Result<Vec<ConflictEvent>> {
        let params = [("pagesize", UCDP_PAGE_SIZE), ("page", "0")];
        let response: UcdpResponse = client.get_json(&self.url, &params).await?;
        Ok(map_records::<UcdpEvent>(response.result, self.name()))
    }
}

/// Deserialize each raw record on its own so one bad record does not sink the batch.
fn map_records<R>(raw: Vec<serde_json::Value>, provider: &str) -> Vec<ConflictEvent>
where
    R: serde::de::DeserializeOwned + Into<ConflictEvent>,
{
    let total = raw.len();
    let events: Vec<ConflictEvent> = raw
        .into_iter()
        .filter_map(|value| serde_json::from_value::<R>(value).ok())
        .map(Into::into)
        .collect();
    if events.len() < total {
        warn!(
            provider,
            skipped = total - events.len(),
            "skipped malformed conflict records"
        );
    }
    events
}

// Fetcher --------------------------------------------------------------------

/// Conflict events from the first provider that yields data.
pub struct ConflictFetcher {
    client: FeedClient,
    providers: Vec<Box<dyn ConflictProvider>>,
}

impl ConflictFetcher {
    pub fn new(client: FeedClient, providers: Vec<Box<dyn ConflictProvider>>) -> Self {
        Self { client, providers }
    }

    /// ACLED then UCDP when credentials are present, UCDP alone otherwise.
    pub fn with_fallback(
        client: FeedClient,
        urls: &SourceUrls,
        credentials: Option<AcledCredentials>,
    ) -> Self {
        let mut providers: Vec<Box<dyn ConflictProvider>> = Vec::new();
        if let Some(credentials) = credentials {
            providers.push(Box::new(AcledProvider::new(&urls.acled, credentials)));
        }
        providers.push(Box::new(UcdpProvider::new(&urls.ucdp)));
        Self::new(client, providers)
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

#[async_trait]
impl Fetcher for ConflictFetcher {
    type Record = ConflictEvent;

    fn kind(&self) -> DataKind {
        DataKind::Conflicts
    }

    async fn fetch(&self) -> Result<Vec<ConflictEvent>> {
        let mut any_succeeded = false;
        for provider in &self.providers {
            match provider.fetch(&self.client).await {
                Ok(events) if !events.is_empty() => {
                    info!(provider = provider.name(), count = events.len(), "conflict events fetched");
                    return Ok(events);
                }
                Ok(_) => {
                    any_succeeded = true;
                    info!(provider = provider.name(), "provider returned no events, trying next");
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "conflict provider failed");
                }
            }
        }

        if any_succeeded {
            Ok(Vec::new())
        } else {
            Err(MonitorError::AllSourcesFailed("conflict".to_string()))
        }
    }
}
