// GDELT geopolitical event feeds.
// Article list from the DOC 2.0 API and geolocated mention clusters from the GEO 2.0 API.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::Result;

use super::client::FeedClient;
use super::types::{GdeltEvent, lat_lng};
use super::{DataKind, Fetcher};

pub const DEFAULT_DOC_QUERY: &str = "(conflict OR crisis OR military)";
pub const DEFAULT_GEO_QUERY: &str = "(conflict OR crisis)";

const DOC_MAX_RECORDS: &str = "50";
const GEO_MAX_POINTS: &str = "200";
const TIMESPAN: &str = "24h";
pub const GEO_SOURCE: &str = "GDELT GEO";

static HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]+)""#).expect("href pattern is valid"));

/// GDELT timestamps look like `20240506T101500Z`.
pub fn parse_seen_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y%m%dT%H%M%SZ")
        .ok()
        .map(|naive| naive.and_utc())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// Article list ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ArticleList {
    #[serde(default)]
    articles: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    domain: String,
    language: Option<String>,
    #[serde(default)]
    seendate: String,
    socialimage: Option<String>,
    tone: Option<f64>,
}

impl From<Article> for GdeltEvent {
    fn from(article: Article) -> Self {
        GdeltEvent {
            title: article.title,
            url: article.url,
            source: article.domain,
            language: non_empty(article.language),
            seen_at: parse_seen_date(&article.seendate),
            image: non_empty(article.socialimage),
            tone: article.tone,
            lat: None,
            lng: None,
            mentions: None,
        }
    }
}

/// Map raw DOC API articles, skipping malformed ones.
pub fn normalize_articles(articles: Vec<serde_json::Value>) -> Vec<GdeltEvent> {
    articles
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Article>(value) {
            Ok(article) => Some(article.into()),
            Err(e) => {
                debug!(error = %e, "skipping malformed GDELT article");
                None
            }
        })
        .collect()
}

/// Recent articles matching a query, newest first.
pub struct GdeltFetcher {
    client: FeedClient,
    url: String,
    query: String,
}

impl GdeltFetcher {
    pub fn new(client: FeedClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            query: DEFAULT_DOC_QUERY.to_string(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }
}

#[async_trait]
impl Fetcher for GdeltFetcher {
    type Record = GdeltEvent;

    fn kind(&self) -> DataKind {
        DataKind::Gdelt
    }

    async fn fetch(&self) -> Result<Vec<GdeltEvent>> {
        let params = [
            ("query", self.query.as_str()),
            ("mode", "artlist"),
            ("maxrecords", DOC_MAX_RECORDS),
            ("format", "json"),
            ("sort", "datedesc"),
            ("timespan", TIMESPAN),
        ];
        let list: ArticleList = self.client.get_json(&self.url, &params).await?;
        let events = normalize_articles(list.articles);
        info!(count = events.len(), "GDELT articles fetched");
        Ok(events)
    }
}

// Geo points -----------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GeoCollection {
    #[serde(default)]
    features: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GeoFeature {
    geometry: GeoPoint,
    #[serde(default)]
    properties: GeoProperties,
}

#[derive(Debug, Deserialize)]
struct GeoPoint {
    coordinates: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct GeoProperties {
    #[serde(default)]
    name: String,
    url: Option<String>,
    html: Option<String>,
    count: Option<u64>,
    shareimage: Option<String>,
}

impl GeoFeature {
    fn into_event(self) -> Option<GdeltEvent> {
        let (lat, lng) = lat_lng(&self.geometry.coordinates)?;
        let props = self.properties;
        let url = non_empty(props.url)
            .or_else(|| {
                props
                    .html
                    .as_deref()
                    .and_then(|html| HREF.captures(html))
                    .map(|caps| caps[1].to_string())
            })
            .unwrap_or_default();

        Some(GdeltEvent {
            title: props.name,
            url,
            source: GEO_SOURCE.to_string(),
            language: None,
            seen_at: None,
            image: non_empty(props.shareimage),
            tone: None,
            lat: Some(lat),
            lng: Some(lng),
            mentions: props.count,
        })
    }
}

/// Map raw GEO API features, skipping malformed or unlocated ones.
pub fn normalize_geo(features: Vec<serde_json::Value>) -> Vec<GdeltEvent> {
    features
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<GeoFeature>(value) {
            Ok(feature) => feature.into_event(),
            Err(e) => {
                debug!(error = %e, "skipping malformed GDELT geo feature");
                None
            }
        })
        .collect()
}

/// Geolocated mention clusters for the map overlay.
pub struct GdeltGeoFetcher {
    client: FeedClient,
    url: String,
    query: String,
}

impl GdeltGeoFetcher {
    pub fn new(client: FeedClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            query: DEFAULT_GEO_QUERY.to_string(),
        }
    }
}

#[async_trait]
impl Fetcher for GdeltGeoFetcher {
    type Record = GdeltEvent;

    fn kind(&self) -> DataKind {
        DataKind::GdeltGeo
    }

    async fn fetch(&self) -> Result<Vec<GdeltEvent>> {
        let params = [
            ("query", self.query.as_str()),
            ("format", "GeoJSON"),
            ("maxpoints", GEO_MAX_POINTS),
            ("timespan", TIMESPAN),
        ];
        let collection: GeoCollection = self.client.get_json(&self.url, &params).await?;
        let events = normalize_geo(collection.features);
        info!(count = events.len(), "GDELT geo points fetched");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::fixture;
    use crate::sources::types::Located;
    use axum::{Json, Router, extract::Query, routing::get};
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_parse_seen_date() {
        assert_eq!(
            parse_seen_date("20240506T101500Z"),
            Some(Utc.with_ymd_and_hms(2024, 5, 6, 10, 15, 0).unwrap())
        );
        assert_eq!(parse_seen_date("2024-05-06"), None);
    }

    #[test]
    fn test_article_mapping() {
        let events = normalize_articles(vec![
            json!({
                "url": "https://news.example/a", "title": "Border clashes",
                "seendate": "20240506T101500Z", "socialimage": "",
                "domain": "news.example", "language": "English"
            }),
            json!("not an article"),
        ]);

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.source, "news.example");
        assert_eq!(event.language.as_deref(), Some("English"));
        assert_eq!(event.image, None);
        assert!(event.seen_at.is_some());
        assert!(!event.has_location());
    }

    #[test]
    fn test_geo_mapping() {
        let events = normalize_geo(vec![
            json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [36.2, 49.99] },
                "properties": {
                    "name": "Kharkiv, Ukraine", "count": 42,
                    "html": "<a href=\"https://news.example/k\" title=\"x\">Story</a>"
                }
            }),
            json!({ "type": "Feature", "geometry": { "coordinates": [] }, "properties": {} }),
        ]);

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.title, "Kharkiv, Ukraine");
        assert_eq!(event.url, "https://news.example/k");
        assert_eq!((event.lat, event.lng), (Some(49.99), Some(36.2)));
        assert_eq!(event.mentions, Some(42));
        assert!(event.has_location());
    }

    #[tokio::test]
    async fn test_fetch_sends_artlist_query() {
        let router = Router::new().route(
            "/gdelt/doc",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let articles = if params.get("mode").map(String::as_str) == Some("artlist") {
                    vec![json!({ "title": "t", "url": "u", "domain": "d", "seendate": "" })]
                } else {
                    Vec::new()
                };
                Json(json!({ "articles": articles }))
            }),
        );
        let base = fixture::serve(router).await;

        let client = FeedClient::new(Duration::from_secs(2)).unwrap();
        let fetcher = GdeltFetcher::new(client, format!("{base}/gdelt/doc")).with_query("ukraine");
        let events = fetcher.fetch().await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].seen_at, None);
    }
}
