// Router tests against stubbed upstreams.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
    routing::get,
};
use chrono::Utc;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use world_monitor::api::{AppState, StateParts, create_router};
use world_monitor::cache::Cache;
use world_monitor::catalog::{FeedSource, SourceUrls};
use world_monitor::config::TtlPolicy;
use world_monitor::layers::StaticLayers;
use world_monitor::sources::FeedClient;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn rss(titles: &[&str]) -> String {
    let items: String = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            format!(
                "<item><title>{title}</title><link>https://example.com/{i}</link>\
                 <pubDate>Mon, 06 May 2024 10:{i:02}:00 GMT</pubDate></item>"
            )
        })
        .collect();
    format!(r#"<?xml version="1.0"?><rss version="2.0"><channel>{items}</channel></rss>"#)
}

fn quake(id: &str, mag: f64) -> Value {
    json!({
        "id": id,
        "properties": {
            "mag": mag, "place": "Offshore", "time": Utc::now().timestamp_millis(),
            "url": "https://example.com/q", "tsunami": 0
        },
        "geometry": { "coordinates": [142.1, 38.3, 10.0] }
    })
}

struct Harness {
    app: Router,
    usgs_hits: Arc<AtomicUsize>,
    _cache_dir: TempDir,
}

async fn harness() -> Harness {
    let usgs_hits = Arc::new(AtomicUsize::new(0));
    let hits = usgs_hits.clone();
    let quakes = json!({ "features": [quake("a", 5.2), quake("b", 6.0), quake("c", 3.1)] });
    let alpha = rss(&["Missile strike reported", "Trade talks resume", "Coup attempt foiled"]);
    let beta = rss(&["Nuclear summit opens"]);
    let eonet = json!({ "events": [
        { "id": "E1", "title": "Fire", "categories": [{ "title": "Wildfires" }],
          "geometry": [{ "date": "2024-05-01", "coordinates": [-120.0, 37.0] }] },
        { "id": "E2", "title": "Unplaced", "categories": [], "geometry": [] }
    ]});

    let upstream = Router::new()
        .route(
            "/usgs",
            get(move || {
                let hits = hits.clone();
                let quakes = quakes.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(quakes)
                }
            }),
        )
        .route(
            "/feeds/alpha",
            get(move || {
                let body = alpha.clone();
                async move { ([(CONTENT_TYPE, "application/rss+xml")], body) }
            }),
        )
        .route(
            "/feeds/beta",
            get(move || {
                let body = beta.clone();
                async move { ([(CONTENT_TYPE, "application/rss+xml")], body) }
            }),
        )
        .route(
            "/eonet",
            get(move || {
                let body = eonet.clone();
                async move { Json(body) }
            }),
        );
    let base = serve(upstream).await;

    let cache_dir = TempDir::new().unwrap();
    let state = AppState::new(StateParts {
        cache: Cache::open(cache_dir.path()).unwrap(),
        client: FeedClient::new(Duration::from_secs(2)).unwrap(),
        feeds: vec![
            FeedSource::new("Alpha", format!("{base}/feeds/alpha")),
            FeedSource::new("Beta", format!("{base}/feeds/beta")),
        ],
        urls: SourceUrls::with_base(&base),
        acled: None,
        layers: StaticLayers::builtin().unwrap(),
        ttl: TtlPolicy::default(),
        static_dir: None,
    });

    Harness {
        app: create_router(state),
        usgs_hits,
        _cache_dir: cache_dir,
    }
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_news_filters() {
    let h = harness().await;

    let (status, body) = get_json(&h.app, "/api/news").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 4);

    let (_, body) = get_json(&h.app, "/api/news?source=Alpha&alerts=true").await;
    let titles: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Missile strike reported"));
    assert!(titles.contains(&"Coup attempt foiled"));

    let (_, body) = get_json(&h.app, "/api/news?source=Alpha&alerts=true&limit=1").await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_query_is_bad_request() {
    let h = harness().await;

    for uri in [
        "/api/news?limit=0",
        "/api/news?limit=1001",
        "/api/earthquakes?limit=abc",
        "/api/news?alerts=sometimes",
        "/api/disasters?mapped=2",
        "/api/news?limit=1&limit=2",
        "/api/conflicts?refresh=true&refresh=false",
    ] {
        let (status, body) = get_json(&h.app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn test_earthquakes_cached_between_requests() {
    let h = harness().await;

    let (_, body) = get_json(&h.app, "/api/earthquakes").await;
    let mags: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["magnitude"].as_f64().unwrap())
        .collect();
    assert_eq!(mags, vec![6.0, 5.2]);

    get_json(&h.app, "/api/earthquakes?limit=1").await;
    assert_eq!(h.usgs_hits.load(Ordering::SeqCst), 1);

    get_json(&h.app, "/api/earthquakes?refresh=true").await;
    assert_eq!(h.usgs_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unavailable_upstreams_return_empty_lists() {
    let h = harness().await;

    for uri in ["/api/conflicts", "/api/gdelt", "/api/gdelt/geo"] {
        let (status, body) = get_json(&h.app, uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body, json!([]), "{uri}");
    }
}

#[tokio::test]
async fn test_disasters_mapped_filter() {
    let h = harness().await;

    let (_, body) = get_json(&h.app, "/api/disasters").await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = get_json(&h.app, "/api/disasters?mapped=true").await;
    let events = body.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["id"], "E1");
    assert_eq!(events[0]["source"], "NASA EONET");
}

#[tokio::test]
async fn test_layers() {
    let h = harness().await;

    let (status, body) = get_json(&h.app, "/api/layers/cables").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 6);

    let (_, body) = get_json(&h.app, "/api/layers/military-bases").await;
    assert!(body[0]["type"].is_string());

    let (status, body) = get_json(&h.app, "/api/layers/submarines").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("submarines"));
}

#[tokio::test]
async fn test_status_reports_freshness() {
    let h = harness().await;

    let (status, body) = get_json(&h.app, "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["data_freshness"]["earthquakes"].is_null());

    get_json(&h.app, "/api/earthquakes").await;

    let (_, body) = get_json(&h.app, "/api/status").await;
    assert!(body["data_freshness"]["earthquakes"].is_u64());
    assert!(body["data_freshness"]["news"].is_null());
}

#[tokio::test]
async fn test_config_endpoint() {
    let h = harness().await;

    let (status, body) = get_json(&h.app, "/api/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feeds"], json!(["Alpha", "Beta"]));
    assert_eq!(body["conflict_providers"], json!(["UCDP"]));
    assert_eq!(body["ttl_seconds"]["news"], 180);
    assert_eq!(body["tier1_countries"].as_array().unwrap().len(), 22);
}
