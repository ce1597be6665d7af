// Upstream HTTP client.
// Applies the shared timeout and user agent, and converts non-2xx responses into errors.

use std::time::Duration;

use reqwest::{
    Client, Response,
    header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::error::{MonitorError, Result};

/// Default bound on a single upstream request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Empty query string for `get_json`.
pub const NO_PARAMS: &[(&str, &str)] = &[];

const USER_AGENT_VALUE: &str = concat!("WorldMonitor/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for all fetchers. Cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
}

impl FeedClient {
    /// Create a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, application/xml, text/xml, */*"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    /// GET `url` and return the body as text.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let response = check_response(response)?;
        Ok(response.text().await?)
    }

    /// GET `url` with query parameters and decode the JSON body.
    pub async fn get_json<T, Q>(&self, url: &str, params: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let response = self.client.get(url).query(params).send().await?;
        let response = check_response(response)?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Reject non-2xx responses.
fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        debug!(url = %response.url(), status = status.as_u16(), "upstream response");
        Ok(response)
    } else {
        Err(MonitorError::Status {
            url: response.url().to_string(),
            status: status.as_u16(),
        })
    }
}
