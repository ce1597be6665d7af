// In-process stub upstream for fetcher tests.
// Serves an axum router on an ephemeral localhost port.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;

/// Serve `router` on 127.0.0.1 and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Shared request counter for asserting which upstreams were contacted.
#[derive(Debug, Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn record(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Minimal RSS 2.0 document with `count` items titled `"{prefix} {i}"`.
pub fn rss_document(prefix: &str, count: usize) -> String {
    let items: String = (0..count)
        .map(|i| {
            format!(
                "<item><title>{prefix} {i}</title><link>https://example.com/{prefix}/{i}</link>\
                 <pubDate>Mon, 06 May 2024 10:{:02}:00 GMT</pubDate></item>",
                i % 60
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>{prefix}</title>{items}</channel></rss>"#
    )
}
