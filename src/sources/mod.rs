// Upstream data sources.
// Each fetcher pulls one kind of data and normalizes it into the types in `types`.

pub mod client;
pub mod conflicts;
pub mod disasters;
pub mod earthquakes;
pub mod gdelt;
pub mod rss;
pub mod types;

#[cfg(test)]
pub(crate) mod fixture;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;

pub use client::FeedClient;
pub use conflicts::{AcledCredentials, ConflictFetcher};
pub use disasters::DisasterFetcher;
pub use earthquakes::EarthquakeFetcher;
pub use gdelt::{GdeltFetcher, GdeltGeoFetcher};
pub use rss::{AlertKeywords, NewsFetcher};
pub use types::*;

/// Kinds of fetched data, one cache entry each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    News,
    Earthquakes,
    Gdelt,
    GdeltGeo,
    Conflicts,
    Disasters,
}

impl DataKind {
    pub const ALL: [DataKind; 6] = [
        DataKind::News,
        DataKind::Earthquakes,
        DataKind::Gdelt,
        DataKind::GdeltGeo,
        DataKind::Conflicts,
        DataKind::Disasters,
    ];

    /// Name used in status output.
    pub fn name(&self) -> &'static str {
        match self {
            DataKind::News => "news",
            DataKind::Earthquakes => "earthquakes",
            DataKind::Gdelt => "gdelt",
            DataKind::GdeltGeo => "gdelt_geo",
            DataKind::Conflicts => "conflicts",
            DataKind::Disasters => "disasters",
        }
    }

    /// Cache key for this kind.
    pub fn cache_key(&self) -> &'static str {
        match self {
            DataKind::News => "rss_news",
            DataKind::Earthquakes => "earthquakes",
            DataKind::Gdelt => "gdelt_events",
            DataKind::GdeltGeo => "gdelt_geo",
            DataKind::Conflicts => "conflict_events",
            DataKind::Disasters => "natural_disasters",
        }
    }

    /// How long a fetched result stays fresh unless overridden.
    pub fn default_ttl(&self) -> Duration {
        let secs = match self {
            DataKind::News => 180,
            DataKind::Earthquakes => 300,
            DataKind::Gdelt | DataKind::GdeltGeo => 600,
            DataKind::Conflicts => 600,
            DataKind::Disasters => 300,
        };
        Duration::from_secs(secs)
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A source of normalized records.
///
/// `fetch` fails only when no data at all could be produced; partial upstream
/// failures are logged and skipped inside the fetcher.
#[async_trait]
pub trait Fetcher: Send + Sync {
    type Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    fn kind(&self) -> DataKind;

    async fn fetch(&self) -> Result<Vec<Self::Record>>;
}
