// USGS earthquake feed.
// Maps GeoJSON features to earthquake events, keeping M4.5+ from the last 24 hours.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::Result;

use super::client::{FeedClient, NO_PARAMS};
use super::types::{EarthquakeEvent, lat_lng};
use super::{DataKind, Fetcher};

/// Smallest magnitude kept.
pub const MIN_MAGNITUDE: f64 = 4.5;
/// How far back events are kept.
pub const WINDOW_HOURS: i64 = 24;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct QuakeFeature {
    #[serde(default)]
    id: String,
    properties: QuakeProperties,
    geometry: PointGeometry,
}

#[derive(Debug, Deserialize)]
struct QuakeProperties {
    mag: Option<f64>,
    place: Option<String>,
    /// Epoch milliseconds.
    time: i64,
    #[serde(default)]
    url: String,
    #[serde(default)]
    tsunami: u8,
    alert: Option<String>,
    felt: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PointGeometry {
    coordinates: Vec<f64>,
}

impl QuakeFeature {
    fn into_event(self) -> Option<EarthquakeEvent> {
        let magnitude = self.properties.mag?;
        let time = DateTime::from_timestamp_millis(self.properties.time)?;
        let (lat, lng) = lat_lng(&self.geometry.coordinates)?;
        let depth = self.geometry.coordinates.get(2).copied().unwrap_or(0.0);

        Some(EarthquakeEvent {
            id: self.id,
            magnitude,
            place: self.properties.place.unwrap_or_else(|| "Unknown".to_string()),
            time,
            url: self.properties.url,
            tsunami: self.properties.tsunami != 0,
            lat,
            lng,
            depth,
            alert: self.properties.alert,
            felt: self.properties.felt,
        })
    }
}

/// Map raw GeoJSON features, dropping malformed ones and anything below
/// M4.5 or older than 24 hours. Sorted strongest first.
pub fn normalize_earthquakes(
    features: Vec<serde_json::Value>,
    now: DateTime<Utc>,
) -> Vec<EarthquakeEvent> {
    let cutoff = now - Duration::hours(WINDOW_HOURS);

    let mut events: Vec<EarthquakeEvent> = features
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<QuakeFeature>(value) {
            Ok(feature) => feature.into_event(),
            Err(e) => {
                debug!(error = %e, "skipping malformed earthquake feature");
                None
            }
        })
        .filter(|event| event.magnitude >= MIN_MAGNITUDE && event.time >= cutoff)
        .collect();

    events.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
    events
}

pub struct EarthquakeFetcher {
    client: FeedClient,
    url: String,
}

impl EarthquakeFetcher {
    pub fn new(client: FeedClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Fetcher for EarthquakeFetcher {
    type Record = EarthquakeEvent;

    fn kind(&self) -> DataKind {
        DataKind::Earthquakes
    }

    async fn fetch(&self) -> Result<Vec<EarthquakeEvent>> {
        let collection: FeatureCollection = self.client.get_json(&self.url, NO_PARAMS).await?;
        let total = collection.features.len();
        let events = normalize_earthquakes(collection.features, Utc::now());
        info!(kept = events.len(), total, "earthquakes fetched");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::fixture;
    use axum::{Json, Router, routing::get};
    use serde_json::json;

    fn feature(id: &str, mag: f64, time: DateTime<Utc>) -> serde_json::Value {
        json!({
            "type": "Feature",
            "id": id,
            "properties": {
                "mag": mag,
                "place": "120 km SSE of Somewhere",
                "time": time.timestamp_millis(),
                "url": format!("https://earthquake.usgs.gov/earthquakes/eventpage/{id}"),
                "tsunami": 1,
                "alert": "green",
                "felt": null
            },
            "geometry": { "type": "Point", "coordinates": [142.1, 38.3, 24.5] }
        })
    }

    #[test]
    fn test_filters_small_magnitudes() {
        let now = Utc::now();
        let events = normalize_earthquakes(
            vec![
                feature("small", 3.0, now - Duration::hours(1)),
                feature("big", 5.2, now - Duration::hours(1)),
            ],
            now,
        );

        assert_eq!(events.len(), 1);
        let quake = &events[0];
        assert_eq!(quake.id, "big");
        assert_eq!(quake.magnitude, 5.2);
        assert_eq!((quake.lat, quake.lng, quake.depth), (38.3, 142.1, 24.5));
        assert!(quake.tsunami);
        assert_eq!(quake.alert.as_deref(), Some("green"));
        assert_eq!(quake.felt, None);
    }

    #[test]
    fn test_filters_old_events_and_sorts() {
        let now = Utc::now();
        let events = normalize_earthquakes(
            vec![
                feature("old", 6.8, now - Duration::hours(30)),
                feature("medium", 4.5, now - Duration::hours(2)),
                feature("strong", 6.1, now - Duration::hours(3)),
            ],
            now,
        );

        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["strong", "medium"]);
    }

    #[test]
    fn test_skips_malformed_features() {
        let now = Utc::now();
        let events = normalize_earthquakes(
            vec![
                json!({ "id": "nogeom", "properties": { "mag": 5.0, "time": now.timestamp_millis() } }),
                json!({ "id": "nomag", "properties": { "mag": null, "time": now.timestamp_millis() },
                        "geometry": { "coordinates": [1.0, 2.0, 3.0] } }),
                feature("ok", 4.9, now),
            ],
            now,
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "ok");
    }

    #[tokio::test]
    async fn test_fetch_from_feed() {
        let now = Utc::now();
        let body = json!({
            "type": "FeatureCollection",
            "features": [feature("a", 3.0, now), feature("b", 5.2, now)]
        });
        let router = Router::new().route("/usgs", get(move || async move { Json(body) }));
        let base = fixture::serve(router).await;

        let client = FeedClient::new(std::time::Duration::from_secs(2)).unwrap();
        let fetcher = EarthquakeFetcher::new(client, format!("{base}/usgs"));
        let events = fetcher.fetch().await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].magnitude, 5.2);
    }
}
