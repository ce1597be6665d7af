// Error types for world-monitor.
// Covers upstream fetch failures, payload parse errors and cache storage errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Malformed payload: {0}")]
    Parse(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("All {0} sources failed")]
    AllSourcesFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl MonitorError {
    /// Whether the error came from the upstream request timing out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, MonitorError::Http(e) if e.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
