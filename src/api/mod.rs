// HTTP API: shared state, client-facing errors and the router.

mod query;
mod routes;

pub use query::{ListOptions, ListParams};
pub use routes::create_router;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::cache::Cache;
use crate::catalog::{FeedSource, SourceUrls, default_feeds};
use crate::config::{Config, TtlPolicy};
use crate::error::Result;
use crate::layers::StaticLayers;
use crate::sources::{
    AcledCredentials, AlertKeywords, ConflictFetcher, DisasterFetcher, EarthquakeFetcher,
    FeedClient, Fetcher, GdeltFetcher, GdeltGeoFetcher, NewsFetcher,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<Cache>,
    pub news: Arc<NewsFetcher>,
    pub earthquakes: Arc<EarthquakeFetcher>,
    pub gdelt: Arc<GdeltFetcher>,
    pub gdelt_geo: Arc<GdeltGeoFetcher>,
    pub conflicts: Arc<ConflictFetcher>,
    pub disasters: Arc<DisasterFetcher>,
    pub layers: Arc<StaticLayers>,
    pub ttl: TtlPolicy,
    pub static_dir: Option<PathBuf>,
    pub start_time: Instant,
}

/// Everything needed to assemble an `AppState`.
pub struct StateParts {
    pub cache: Cache,
    pub client: FeedClient,
    pub feeds: Vec<FeedSource>,
    pub urls: SourceUrls,
    pub acled: Option<AcledCredentials>,
    pub layers: StaticLayers,
    pub ttl: TtlPolicy,
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(parts: StateParts) -> Self {
        let StateParts {
            cache,
            client,
            feeds,
            urls,
            acled,
            layers,
            ttl,
            static_dir,
        } = parts;

        Self {
            cache: Arc::new(cache),
            news: Arc::new(NewsFetcher::new(
                client.clone(),
                feeds,
                AlertKeywords::default(),
            )),
            earthquakes: Arc::new(EarthquakeFetcher::new(client.clone(), &urls.usgs)),
            gdelt: Arc::new(GdeltFetcher::new(client.clone(), &urls.gdelt_doc)),
            gdelt_geo: Arc::new(GdeltGeoFetcher::new(client.clone(), &urls.gdelt_geo)),
            conflicts: Arc::new(ConflictFetcher::with_fallback(client.clone(), &urls, acled)),
            disasters: Arc::new(DisasterFetcher::new(client, &urls)),
            layers: Arc::new(layers),
            ttl,
            static_dir,
            start_time: Instant::now(),
        }
    }

    /// Build the production state against the real upstreams.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache_dir = config.cache_dir();
        let cache = Cache::open(&cache_dir)?;
        info!(dir = %cache_dir.display(), "cache opened");

        let acled = config.acled_credentials();
        if acled.is_none() {
            info!("ACLED credentials not set, conflicts come from UCDP only");
        }

        Ok(Self::new(StateParts {
            cache,
            client: FeedClient::new(config.request_timeout())?,
            feeds: default_feeds(),
            urls: SourceUrls::default(),
            acled,
            layers: StaticLayers::load(config.layers_file.as_deref())?,
            ttl: config.ttl_policy(),
            static_dir: config.static_dir.clone(),
        }))
    }

    /// Records for `fetcher`'s kind, through the cache.
    ///
    /// Never fails: a failed fetch yields the last stored data or an empty list.
    pub async fn load<F: Fetcher>(&self, fetcher: &F, refresh: bool) -> Vec<F::Record> {
        let kind = fetcher.kind();
        let ttl = self.ttl.for_kind(kind);
        if refresh {
            self.cache
                .refresh(kind.cache_key(), ttl, || fetcher.fetch())
                .await
        } else {
            self.cache
                .get_or_fetch(kind.cache_key(), ttl, || fetcher.fetch())
                .await
        }
    }
}

/// Client-facing errors. Upstream failures never reach this type.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
