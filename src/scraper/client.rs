//! Blocking JSON client for the API.

use crate::scraper::error::ScraperError;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; ranobelib/0.1; +https://github.com/ranobelib)";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

/// GET a URL with extra headers and return the parsed JSON body.
///
/// Transport policy (timeouts, retries) belongs to the implementation; callers only see the
/// body or the error.
pub trait Fetch {
    fn fetch_json(&mut self, url: &str, headers: &[(String, String)])
        -> Result<Value, ScraperError>;
}

/// reqwest-backed [Fetch].
#[derive(Debug)]
pub struct ApiClient {
    inner: reqwest::blocking::Client,
}

impl ApiClient {
    /// Build a client with default User-Agent and timeout.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }
}

impl Fetch for ApiClient {
    fn fetch_json(
        &mut self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<Value, ScraperError> {
        tracing::debug!(url, "GET");
        let mut request = self
            .inner
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().map_err(|e| ScraperError::Network {
            url: url.to_string(),
            source: e,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.text().map_err(|e| ScraperError::BodyRead {
            url: url.to_string(),
            source: e,
        })?;
        serde_json::from_str(&body).map_err(|e| ScraperError::Json {
            url: url.to_string(),
            source: e,
        })
    }
}

/// Builder for [ApiClient] with optional User-Agent and timeout.
#[derive(Debug)]
pub struct ApiClientBuilder {
    user_agent: Option<String>,
    timeout_secs: u64,
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ApiClientBuilder {
    /// Set a custom User-Agent. If not set, a browser-like default is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<ApiClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(ApiClient { inner })
    }
}
