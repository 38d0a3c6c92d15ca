// # HTTP IP Source
//
// This crate provides an HTTP-based IP source for the DDNS daemon.
//
// ## Architecture
//
// Fetches the current public IP from an IP echo service (api.ipify.org by
// default) that answers a plain GET with the caller's address as text.
// Every call to `current()` is exactly one request; there is no caching
// and no background polling. Scheduling belongs to the engine.

use ddns_core::config::IpSourceConfig;
use ddns_core::traits::{IpSource, PublicIp};
use ddns_core::{Error, Result};

use std::time::Duration;

/// Default request timeout for IP lookups
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-based IP source
#[derive(Debug, Clone)]
pub struct HttpIpSource {
    /// URL to fetch IP from
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a new HTTP IP source with the default 10 second timeout
    ///
    /// # Parameters
    ///
    /// - `url`: URL to fetch IP from (e.g., "https://api.ipify.org")
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Create with a custom request timeout
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Create from the IP source section of the configuration
    pub fn from_config(config: &IpSourceConfig) -> Result<Self> {
        Self::with_timeout(config.url.clone(), config.timeout())
    }

    /// The lookup URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<PublicIp> {
        tracing::debug!("Fetching external IP from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::http(format!("Request to {} timed out", self.url))
                } else {
                    Error::http(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(Error::http(format!(
                "IP lookup returned status {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response: {}", e)))?;

        let ip = PublicIp::new(&body)
            .ok_or_else(|| Error::ip_source(format!("Empty response from {}", self.url)))?;

        tracing::debug!("External IP is {}", ip);
        Ok(ip)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
