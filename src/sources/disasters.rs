// Natural disasters from NASA EONET and GDACS.
// Both catalogs are fetched concurrently and merged, each record tagged with its origin.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::catalog::SourceUrls;
use crate::error::{MonitorError, Result};

use super::client::FeedClient;
use super::types::{DisasterEvent, lenient_string};
use super::{DataKind, Fetcher};

pub const EONET_SOURCE: &str = "NASA EONET";
pub const GDACS_SOURCE: &str = "GDACS";

const EONET_LIMIT: &str = "50";
const MAX_GDACS_EVENTS: usize = 50;

/// Pull the first `[lng, lat]` pair out of a Point or nested Polygon coordinate array.
fn first_position(coordinates: &serde_json::Value) -> Option<(f64, f64)> {
    let array = coordinates.as_array()?;
    match (
        array.first().and_then(|v| v.as_f64()),
        array.get(1).and_then(|v| v.as_f64()),
    ) {
        (Some(lng), Some(lat)) => Some((lat, lng)),
        _ => first_position(array.first()?),
    }
}

// EONET ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EonetResponse {
    #[serde(default)]
    events: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct EonetEvent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    categories: Vec<EonetCategory>,
    #[serde(default)]
    geometry: Vec<EonetGeometry>,
}

#[derive(Debug, Deserialize)]
struct EonetCategory {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct EonetGeometry {
    #[serde(default)]
    date: String,
    #[serde(default)]
    coordinates: serde_json::Value,
}

impl From<EonetEvent> for DisasterEvent {
    fn from(event: EonetEvent) -> Self {
        // Latest observation is last.
        let latest = event.geometry.last();
        let (lat, lng) = latest
            .and_then(|g| first_position(&g.coordinates))
            .unwrap_or((0.0, 0.0));
        DisasterEvent {
            id: event.id,
            title: event.title,
            category: event
                .categories
                .first()
                .map(|c| c.title.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            alert_level: None,
            severity: None,
            lat,
            lng,
            date: latest.map(|g| g.date.clone()).unwrap_or_default(),
            source: EONET_SOURCE.to_string(),
        }
    }
}

/// Map raw EONET events, skipping malformed ones.
pub fn normalize_eonet(events: Vec<serde_json::Value>) -> Vec<DisasterEvent> {
    events
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<EonetEvent>(value) {
            Ok(event) => Some(event.into()),
            Err(e) => {
                debug!(error = %e, "skipping malformed EONET event");
                None
            }
        })
        .collect()
}

// GDACS ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GdacsResponse {
    #[serde(default)]
    features: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GdacsFeature {
    properties: GdacsProperties,
    #[serde(default)]
    geometry: Option<GdacsGeometry>,
}

#[derive(Debug, Deserialize)]
struct GdacsProperties {
    #[serde(default, deserialize_with = "lenient_string")]
    eventid: String,
    name: Option<String>,
    eventname: Option<String>,
    #[serde(default)]
    eventtype: String,
    alertlevel: Option<String>,
    #[serde(default)]
    fromdate: String,
    severitydata: Option<GdacsSeverity>,
}

#[derive(Debug, Deserialize)]
struct GdacsSeverity {
    severitytext: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GdacsGeometry {
    #[serde(default)]
    coordinates: serde_json::Value,
}

impl From<GdacsFeature> for DisasterEvent {
    fn from(feature: GdacsFeature) -> Self {
        let props = feature.properties;
        let (lat, lng) = feature
            .geometry
            .and_then(|g| first_position(&g.coordinates))
            .unwrap_or((0.0, 0.0));
        DisasterEvent {
            id: props.eventid,
            title: props
                .name
                .filter(|n| !n.is_empty())
                .or(props.eventname)
                .unwrap_or_default(),
            category: props.eventtype,
            alert_level: props.alertlevel,
            severity: props.severitydata.and_then(|s| s.severitytext),
            lat,
            lng,
            date: props.fromdate,
            source: GDACS_SOURCE.to_string(),
        }
    }
}

/// Map raw GDACS features, skipping malformed ones. Keeps at most 50.
pub fn normalize_gdacs(features: Vec<serde_json::Value>) -> Vec<DisasterEvent> {
    features
        .into_iter()
        .take(MAX_GDACS_EVENTS)
        .filter_map(|value| match serde_json::from_value::<GdacsFeature>(value) {
            Ok(feature) => Some(feature.into()),
            Err(e) => {
                debug!(error = %e, "skipping malformed GDACS feature");
                None
            }
        })
        .collect()
}

/// Concatenate per-source results. Fails only if every source failed.
pub fn merge_sources(
    results: Vec<(&str, Result<Vec<DisasterEvent>>)>,
) -> Result<Vec<DisasterEvent>> {
    let mut merged = Vec::new();
    let mut any_succeeded = false;
    for (source, result) in results {
        match result {
            Ok(events) => {
                any_succeeded = true;
                debug!(source, count = events.len(), "disaster source fetched");
                merged.extend(events);
            }
            Err(e) => warn!(source, error = %e, "disaster source failed"),
        }
    }

    if any_succeeded {
        Ok(merged)
    } else {
        Err(MonitorError::AllSourcesFailed("disaster".to_string()))
    }
}

// Fetcher --------------------------------------------------------------------

pub struct DisasterFetcher {
    client: FeedClient,
    eonet_url: String,
    gdacs_url: String,
}

impl DisasterFetcher {
    pub fn new(client: FeedClient, urls: &SourceUrls) -> Self {
        Self {
            client,
            eonet_url: urls.eonet.clone(),
            gdacs_url: urls.gdacs.clone(),
        }
    }

    async fn fetch_eonet(&self) -> Result<Vec<DisasterEvent>> {
        let params = [("status", "open"), ("limit", EONET_LIMIT)];
        let response: EonetResponse = self.client.get_json(&self.eonet_url, &params).await?;
        Ok(normalize_eonet(response.events))
    }

    async fn fetch_gdacs(&self) -> Result<Vec<DisasterEvent>> {
        let params = [("alertlevel", "Green;Orange;Red"), ("eventlist", "")];
        let response: GdacsResponse = self.client.get_json(&self.gdacs_url, &params).await?;
        Ok(normalize_gdacs(response.features))
    }
}

#[async_trait]
impl Fetcher for DisasterFetcher {
    type Record = DisasterEvent;

    fn kind(&self) -> DataKind {
        DataKind::Disasters
    }

    async fn fetch(&self) -> Result<Vec<DisasterEvent>> {
        let (eonet, gdacs) = tokio::join!(self.fetch_eonet(), self.fetch_gdacs());
        let merged = merge_sources(vec![(EONET_SOURCE, eonet), (GDACS_SOURCE, gdacs)])?;
        info!(count = merged.len(), "disasters fetched");
        Ok(merged)
    }
}
