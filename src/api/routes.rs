// Route table and handlers for the JSON API.
// Data endpoints read through the cache; layers, status and config are served from memory.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    routing::get,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::debug;

use super::{ApiError, ApiResult, AppState, ListOptions, ListParams};
use crate::catalog::TIER1_COUNTRIES;
use crate::layers::LayerKind;
use crate::sources::{
    ConflictEvent, DataKind, DisasterEvent, EarthquakeEvent, GdeltEvent, NewsItem,
};

pub fn create_router(state: AppState) -> Router {
    let static_dir = state.static_dir.clone();

    let router = Router::new()
        .route("/api/news", get(news))
        .route("/api/earthquakes", get(earthquakes))
        .route("/api/gdelt", get(gdelt))
        .route("/api/gdelt/geo", get(gdelt_geo))
        .route("/api/conflicts", get(conflicts))
        .route("/api/disasters", get(disasters))
        .route("/api/layers/:name", get(layer))
        .route("/api/status", get(status))
        .route("/api/config", get(config))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn news(
    State(state): State<AppState>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Vec<NewsItem>>> {
    let options = ListOptions::from_query(query)?;
    let items = state.load(state.news.as_ref(), options.refresh).await;
    Ok(Json(options.apply_news(items)))
}

async fn earthquakes(
    State(state): State<AppState>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Vec<EarthquakeEvent>>> {
    let options = ListOptions::from_query(query)?;
    let events = state.load(state.earthquakes.as_ref(), options.refresh).await;
    Ok(Json(options.apply_located(events)))
}

async fn gdelt(
    State(state): State<AppState>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Vec<GdeltEvent>>> {
    let options = ListOptions::from_query(query)?;
    let events = state.load(state.gdelt.as_ref(), options.refresh).await;
    Ok(Json(options.apply_located(events)))
}

async fn gdelt_geo(
    State(state): State<AppState>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Vec<GdeltEvent>>> {
    let options = ListOptions::from_query(query)?;
    let events = state.load(state.gdelt_geo.as_ref(), options.refresh).await;
    Ok(Json(options.apply_located(events)))
}

async fn conflicts(
    State(state): State<AppState>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Vec<ConflictEvent>>> {
    let options = ListOptions::from_query(query)?;
    let events = state.load(state.conflicts.as_ref(), options.refresh).await;
    Ok(Json(options.apply_located(events)))
}

async fn disasters(
    State(state): State<AppState>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Vec<DisasterEvent>>> {
    let options = ListOptions::from_query(query)?;
    let events = state.load(state.disasters.as_ref(), options.refresh).await;
    Ok(Json(options.apply_located(events)))
}

async fn layer(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let kind: LayerKind = name.parse().map_err(|_| {
        debug!(layer = %name, "unknown layer requested");
        ApiError::NotFound(format!("unknown layer: {name}"))
    })?;
    Ok(Json(state.layers.to_json(kind)))
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    /// Seconds since each kind was last stored, or null if never.
    data_freshness: BTreeMap<&'static str, Option<u64>>,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let data_freshness = DataKind::ALL
        .iter()
        .map(|kind| {
            let age = state.cache.age(kind.cache_key()).map(|age| age.as_secs());
            (kind.name(), age)
        })
        .collect();

    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        data_freshness,
    })
}

#[derive(Serialize)]
struct CountryInfo {
    code: &'static str,
    name: &'static str,
}

#[derive(Serialize)]
struct ConfigResponse {
    feeds: Vec<String>,
    alert_keywords: Vec<String>,
    tier1_countries: Vec<CountryInfo>,
    conflict_providers: Vec<&'static str>,
    layers: Vec<&'static str>,
    ttl_seconds: BTreeMap<&'static str, u64>,
}

async fn config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        feeds: state.news.feeds().iter().map(|f| f.name.clone()).collect(),
        alert_keywords: state.news.keywords().words().to_vec(),
        tier1_countries: TIER1_COUNTRIES
            .iter()
            .map(|&(code, name)| CountryInfo { code, name })
            .collect(),
        conflict_providers: state.conflicts.provider_names(),
        layers: LayerKind::ALL.iter().map(|kind| kind.name()).collect(),
        ttl_seconds: DataKind::ALL
            .iter()
            .map(|&kind| (kind.name(), state.ttl.for_kind(kind).as_secs()))
            .collect(),
    })
}
