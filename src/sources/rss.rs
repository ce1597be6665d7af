// RSS/Atom news aggregation.
// Fetches the configured feeds concurrently, parses RSS 2.0, Atom and RSS 1.0 (RDF),
// and tags headlines that match an alert keyword.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::stream::{self, StreamExt};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::catalog::{ALERT_KEYWORDS, FeedSource};
use crate::error::{MonitorError, Result};

use super::client::FeedClient;
use super::types::{NewsItem, truncate_chars};
use super::{DataKind, Fetcher};

/// Entries taken from a single feed.
const MAX_ITEMS_PER_FEED: usize = 20;
/// Summary length cap, in characters.
const MAX_SUMMARY_CHARS: usize = 500;
/// Feeds fetched at once.
const MAX_CONCURRENT_FEEDS: usize = 8;

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));

/// Naive formats seen in the wild, interpreted as UTC.
const NAIVE_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%a, %d %b %Y %H:%M:%S",
];

/// Case-insensitive alert keyword list.
#[derive(Debug, Clone)]
pub struct AlertKeywords {
    words: Vec<String>,
}

impl AlertKeywords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// True if any keyword occurs as a substring of the title or summary.
    pub fn matches(&self, title: &str, summary: &str) -> bool {
        let text = format!("{} {}", title, summary).to_lowercase();
        self.words.iter().any(|w| text.contains(w.as_str()))
    }
}

impl Default for AlertKeywords {
    fn default() -> Self {
        Self::new(ALERT_KEYWORDS)
    }
}

/// Remove HTML tags, decode entities and collapse whitespace.
pub fn strip_html(text: &str) -> String {
    let without_tags = HTML_TAG.replace_all(text, "");
    let decoded = html_escape::decode_html_entities(&without_tags);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a feed timestamp, falling back to `now` when the format is unknown.
pub fn parse_date(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let raw = raw.trim();
    if raw.is_empty() {
        return now;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return dt.with_timezone(&Utc);
    }
    for format in NAIVE_DATE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return naive.and_utc();
        }
    }

    debug!(raw, "unrecognized feed date");
    now
}

/// Child element of an entry that we keep text from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Summary,
    Content,
    Published,
    Updated,
}

impl Field {
    fn from_tag(local_name: &[u8]) -> Option<Self> {
        match local_name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" | b"summary" => Some(Field::Summary),
            b"content" | b"encoded" => Some(Field::Content),
            b"pubDate" | b"published" | b"date" | b"issued" => Some(Field::Published),
            b"updated" | b"modified" => Some(Field::Updated),
            _ => None,
        }
    }
}

/// Text collected for one `<item>` or `<entry>` before normalization.
#[derive(Debug, Default)]
struct RawEntry {
    title: String,
    link: String,
    alternate_link: Option<String>,
    other_link: Option<String>,
    summary: String,
    content: String,
    published: String,
    updated: String,
    /// Fields whose first element has closed with text; later siblings are ignored.
    closed: Vec<Field>,
}

impl RawEntry {
    fn text_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Summary => &mut self.summary,
            Field::Content => &mut self.content,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
        }
    }

    /// Append a text or CDATA chunk of the element currently open for `field`.
    fn push_text(&mut self, field: Field, text: &str) {
        if !self.closed.contains(&field) {
            self.text_mut(field).push_str(text);
        }
    }

    /// The element for `field` ended. Keep its value if it had any.
    fn close(&mut self, field: Field) {
        if !self.text_mut(field).trim().is_empty() && !self.closed.contains(&field) {
            self.closed.push(field);
        }
    }

    /// Record an Atom `<link href>`; `rel="alternate"` (or no rel) wins.
    fn offer_link(&mut self, element: &BytesStart<'_>) {
        let mut href = None;
        let mut rel = None;
        for attr in element.attributes().flatten() {
            let value = attr.unescape_value().ok().map(|v| v.into_owned());
            match attr.key.local_name().as_ref() {
                b"href" => href = value,
                b"rel" => rel = value,
                _ => {}
            }
        }

        let Some(href) = href.filter(|h| !h.trim().is_empty()) else {
            return;
        };
        match rel.as_deref() {
            None | Some("alternate") => {
                self.alternate_link.get_or_insert(href);
            }
            Some(_) => {
                self.other_link.get_or_insert(href);
            }
        }
    }

    fn into_item(
        self,
        source: &str,
        keywords: &AlertKeywords,
        now: DateTime<Utc>,
    ) -> Option<NewsItem> {
        let title = strip_html(&self.title);
        if title.is_empty() {
            return None;
        }

        let link = match self.link.trim() {
            "" => self.alternate_link.or(self.other_link).unwrap_or_default(),
            text => text.to_string(),
        };

        let raw_summary = if self.summary.trim().is_empty() {
            &self.content
        } else {
            &self.summary
        };
        let summary = truncate_chars(&strip_html(raw_summary), MAX_SUMMARY_CHARS);

        let published = if self.published.trim().is_empty() {
            parse_date(&self.updated, now)
        } else {
            parse_date(&self.published, now)
        };

        let is_alert = keywords.matches(&title, &summary);
        Some(NewsItem {
            source: source.to_string(),
            title,
            link,
            published,
            summary: (!summary.is_empty()).then_some(summary),
            is_alert,
        })
    }
}

/// Parse an RSS 2.0, Atom or RSS 1.0 document into news items.
///
/// Entries are recognized by their local name (`item` or `entry`) so namespace
/// prefixes do not matter. At most 20 entries are returned; entries without a
/// title are skipped.
pub fn parse_feed(
    xml: &str,
    source: &str,
    keywords: &AlertKeywords,
    now: DateTime<Utc>,
) -> Result<Vec<NewsItem>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<RawEntry> = None;
    // Nesting depth within the current entry; the entry element itself is 1.
    let mut depth = 0usize;
    let mut field: Option<Field> = None;

    while entries.len() < MAX_ITEMS_PER_FEED {
        match reader.read_event()? {
            Event::Start(e) => match current.as_mut() {
                Some(entry) => {
                    depth += 1;
                    if depth == 2 {
                        field = Field::from_tag(e.local_name().as_ref());
                        if field == Some(Field::Link) {
                            entry.offer_link(&e);
                        }
                    }
                }
                None => {
                    if matches!(e.local_name().as_ref(), b"item" | b"entry") {
                        current = Some(RawEntry::default());
                        depth = 1;
                    }
                }
            },
            Event::Empty(e) => {
                if let Some(entry) = current.as_mut() {
                    if depth == 1 && e.local_name().as_ref() == b"link" {
                        entry.offer_link(&e);
                    }
                }
            }
            Event::Text(t) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    let text = t
                        .unescape()
                        .map(|s| s.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    entry.push_text(f, &text);
                }
            }
            Event::CData(c) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    entry.push_text(f, &String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                if let Some(entry) = current.as_mut() {
                    depth -= 1;
                    if depth == 1 {
                        if let Some(f) = field.take() {
                            entry.close(f);
                        }
                    } else if depth == 0 {
                        field = None;
                        entries.extend(current.take());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries
        .into_iter()
        .filter_map(|entry| entry.into_item(source, keywords, now))
        .collect())
}

/// Aggregates every configured feed into one list, newest first.
pub struct NewsFetcher {
    client: FeedClient,
    feeds: Vec<FeedSource>,
    keywords: AlertKeywords,
}

impl NewsFetcher {
    pub fn new(client: FeedClient, feeds: Vec<FeedSource>, keywords: AlertKeywords) -> Self {
        Self {
            client,
            feeds,
            keywords,
        }
    }

    pub fn feeds(&self) -> &[FeedSource] {
        &self.feeds
    }

    pub fn keywords(&self) -> &AlertKeywords {
        &self.keywords
    }

    async fn fetch_feed(&self, feed: &FeedSource) -> Result<Vec<NewsItem>> {
        let body = self.client.get_text(&feed.url).await?;
        parse_feed(&body, &feed.name, &self.keywords, Utc::now())
    }
}

#[async_trait]
impl Fetcher for NewsFetcher {
    type Record = NewsItem;

    fn kind(&self) -> DataKind {
        DataKind::News
    }

    async fn fetch(&self) -> Result<Vec<NewsItem>> {
        let requests: Vec<_> = self
            .feeds
            .iter()
            .map(|feed| async move { (feed, self.fetch_feed(feed).await) })
            .collect();
        let results: Vec<_> = stream::iter(requests)
            .buffer_unordered(MAX_CONCURRENT_FEEDS)
            .collect()
            .await;

        let mut items = Vec::new();
        let mut failed = 0usize;
        for (feed, result) in results {
            match result {
                Ok(feed_items) => {
                    debug!(feed = %feed.name, count = feed_items.len(), "feed parsed");
                    items.extend(feed_items);
                }
                Err(e) => {
                    failed += 1;
                    warn!(feed = %feed.name, timeout = e.is_timeout(), error = %e, "feed fetch failed");
                }
            }
        }

        if !self.feeds.is_empty() && failed == self.feeds.len() {
            return Err(MonitorError::AllSourcesFailed("news feed".to_string()));
        }

        items.sort_by(|a, b| b.published.cmp(&a.published));
        info!(
            items = items.len(),
            feeds = self.feeds.len() - failed,
            failed,
            "news aggregated"
        );
        Ok(items)
    }
}
