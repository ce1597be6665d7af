// Built-in source catalog.
// RSS feeds, alert keywords, monitored countries and upstream endpoint URLs.

use serde::Serialize;

/// A named RSS/Atom feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Feeds grouped by tier: wire services, major outlets, analysis, aggregators.
const RSS_FEEDS: &[(&str, &str)] = &[
    (
        "Reuters",
        "https://news.google.com/rss/search?q=site:reuters.com+world&hl=en",
    ),
    (
        "AP News",
        "https://news.google.com/rss/search?q=site:apnews.com+world&hl=en",
    ),
    ("BBC World", "https://feeds.bbci.co.uk/news/world/rss.xml"),
    ("France 24", "https://www.france24.com/en/rss"),
    ("Al Jazeera", "https://www.aljazeera.com/xml/rss/all.xml"),
    ("The Guardian", "https://www.theguardian.com/world/rss"),
    ("NPR", "https://feeds.npr.org/1004/rss.xml"),
    ("DW News", "https://rss.dw.com/rdf/rss-en-world"),
    ("NHK World", "https://www3.nhk.or.jp/rss/news/cat0.xml"),
    (
        "EuroNews",
        "https://www.euronews.com/rss?level=theme&name=news",
    ),
    ("CSIS", "https://www.csis.org/analysis/feed"),
    ("War on the Rocks", "https://warontherocks.com/feed/"),
    ("The Diplomat", "https://thediplomat.com/feed/"),
    ("Defense One", "https://www.defenseone.com/rss/"),
    ("Brookings", "https://www.brookings.edu/feed/"),
    ("Hacker News", "https://hnrss.org/frontpage"),
];

/// Words that flag a headline as an alert.
pub const ALERT_KEYWORDS: &[&str] = &[
    "war",
    "invasion",
    "nuclear",
    "sanctions",
    "missile",
    "coup",
    "terror attack",
    "martial law",
    "ceasefire",
    "escalation",
    "troops",
    "airstrike",
    "drone strike",
    "explosion",
    "emergency",
    "evacuation",
    "chemical",
    "biological",
    "cyber attack",
    "blackout",
];

/// Tier-1 monitored countries (ISO code, name).
pub const TIER1_COUNTRIES: &[(&str, &str)] = &[
    ("US", "United States"),
    ("RU", "Russia"),
    ("CN", "China"),
    ("IN", "India"),
    ("DE", "Germany"),
    ("FR", "France"),
    ("GB", "United Kingdom"),
    ("BR", "Brazil"),
    ("IR", "Iran"),
    ("IL", "Israel"),
    ("SA", "Saudi Arabia"),
    ("AE", "United Arab Emirates"),
    ("SY", "Syria"),
    ("YE", "Yemen"),
    ("TR", "Turkey"),
    ("TW", "Taiwan"),
    ("KP", "North Korea"),
    ("MM", "Myanmar"),
    ("UA", "Ukraine"),
    ("PL", "Poland"),
    ("PK", "Pakistan"),
    ("VE", "Venezuela"),
];

/// The built-in RSS feed list.
pub fn default_feeds() -> Vec<FeedSource> {
    RSS_FEEDS
        .iter()
        .map(|(name, url)| FeedSource::new(*name, *url))
        .collect()
}

/// Upstream endpoints for the non-RSS fetchers.
#[derive(Debug, Clone)]
pub struct SourceUrls {
    pub usgs: String,
    pub acled: String,
    pub ucdp: String,
    pub eonet: String,
    pub gdacs: String,
    pub gdelt_doc: String,
    pub gdelt_geo: String,
}

impl Default for SourceUrls {
    fn default() -> Self {
        Self {
            usgs: "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/4.5_day.geojson"
                .to_string(),
            acled: "https://api.acleddata.com/acled/read".to_string(),
            ucdp: "https://ucdpapi.pcr.uu.se/api/gedevents/24.1".to_string(),
            eonet: "https://eonet.gsfc.nasa.gov/api/v3/events".to_string(),
            gdacs: "https://www.gdacs.org/gdacsapi/api/events/geteventlist/SEARCH".to_string(),
            gdelt_doc: "https://api.gdeltproject.org/api/v2/doc/doc".to_string(),
            gdelt_geo: "https://api.gdeltproject.org/api/v2/geo/geo".to_string(),
        }
    }
}

impl SourceUrls {
    /// Route every upstream to a fixed path under `base`, for stubbed upstreams.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            usgs: format!("{base}/usgs"),
            acled: format!("{base}/acled"),
            ucdp: format!("{base}/ucdp"),
            eonet: format!("{base}/eonet"),
            gdacs: format!("{base}/gdacs"),
            gdelt_doc: format!("{base}/gdelt/doc"),
            gdelt_geo: format!("{base}/gdelt/geo"),
        }
    }
}
