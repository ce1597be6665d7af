// Normalized record types served by the API.
// Every upstream shape is mapped into one of these before it is cached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Records that may carry a map position.
pub trait Located {
    fn coordinates(&self) -> Option<(f64, f64)>;

    /// Whether the record can be placed on the map. (0, 0) counts as missing.
    fn has_location(&self) -> bool {
        matches!(self.coordinates(), Some((lat, lng)) if lat != 0.0 || lng != 0.0)
    }
}

/// News article from an RSS/Atom feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Feed name the article came from.
    pub source: String,
    pub title: String,
    pub link: String,
    pub published: DateTime<Utc>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Title or summary matched an alert keyword.
    pub is_alert: bool,
}

/// Earthquake from the USGS feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarthquakeEvent {
    pub id: String,
    pub magnitude: f64,
    pub place: String,
    /// Origin time, as epoch milliseconds on the wire.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
    pub url: String,
    pub tsunami: bool,
    pub lat: f64,
    pub lng: f64,
    /// Depth in kilometres.
    pub depth: f64,
    /// PAGER alert level (green, yellow, orange, red).
    pub alert: Option<String>,
    pub felt: Option<u32>,
}

impl Located for EarthquakeEvent {
    fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.lat, self.lng))
    }
}

/// Armed conflict or protest event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictEvent {
    pub id: String,
    pub date: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub sub_type: String,
    pub country: String,
    pub region: String,
    pub lat: f64,
    pub lng: f64,
    pub fatalities: u32,
    pub notes: String,
    pub source: String,
}

impl Located for ConflictEvent {
    fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.lat, self.lng))
    }
}

/// Natural disaster or hazard event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisasterEvent {
    pub id: String,
    pub title: String,
    pub category: String,
    pub alert_level: Option<String>,
    pub severity: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub date: String,
    pub source: String,
}

impl Located for DisasterEvent {
    fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.lat, self.lng))
    }
}

/// GDELT article or geolocated mention cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GdeltEvent {
    pub title: String,
    pub url: String,
    pub source: String,
    pub language: Option<String>,
    pub seen_at: Option<DateTime<Utc>>,
    pub image: Option<String>,
    pub tone: Option<f64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub mentions: Option<u64>,
}

impl Located for GdeltEvent {
    fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.lat?, self.lng?))
    }
}

/// Accept a number, a numeric string, or null. Upstreams disagree on which they send.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// Accept a string or a number as a string identifier.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

/// `[lng, lat, ...]` GeoJSON position into `(lat, lng)`.
pub fn lat_lng(position: &[f64]) -> Option<(f64, f64)> {
    match position {
        [lng, lat, ..] => Some((*lat, *lng)),
        _ => None,
    }
}
