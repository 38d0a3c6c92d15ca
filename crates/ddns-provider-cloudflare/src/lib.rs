// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for the DDNS daemon.
//
// - ✅ Exactly one HTTP request per trait call
// - ✅ HTTP timeout on every request (30 seconds by default)
// - ✅ Specific error mapping for 401/403, 429 and other statuses
// - ✅ Strict envelope parsing: malformed bodies are provider errors, never panics
// - ✅ Dry-run mode for safe testing
// - ❌ NO retry logic (owned by DdnsEngine's schedule)
// - ❌ NO caching (records are listed fresh on every update pass)
//
// ## Security Requirements
//
// - API token NEVER appears in logs
// - Provider refuses to build with an empty token or zone
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=A`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ddns_core::config::ProviderConfig;
use ddns_core::traits::{DnsProvider, DnsRecord};
use ddns_core::{Error, Result};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// TTL value Cloudflare interprets as "automatic"
pub const AUTOMATIC_TTL: u32 = 1;

const PROVIDER: &str = "cloudflare";

/// Standard Cloudflare response wrapper
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

/// Paging details attached to list responses
#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_count: Option<usize>,
}

impl ResultInfo {
    /// How many matching records the response left out, if any
    fn unreturned(&self, returned: usize) -> Option<usize> {
        self.total_count
            .filter(|&total| total > returned)
            .map(|total| total - returned)
    }
}

/// One entry of an envelope's `errors` list
#[derive(Debug, Clone, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

impl fmt::Display for ApiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{}: {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

fn render_errors(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Body of the per-record PUT
///
/// Type is always A and TTL is always automatic; everything else comes
/// from the listed record.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct UpdatePayload<'a> {
    #[serde(rename = "type")]
    record_type: &'static str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

impl<'a> From<&'a DnsRecord> for UpdatePayload<'a> {
    fn from(record: &'a DnsRecord) -> Self {
        Self {
            record_type: "A",
            name: &record.name,
            content: &record.content,
            ttl: AUTOMATIC_TTL,
            proxied: record.proxied,
        }
    }
}

/// Cloudflare DNS provider
///
/// Bound to a single zone and API token at construction.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform the listing GET
/// - Log the intended PUT payload
/// - **NOT** actually modify DNS records
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone whose A records are managed
    zone_id: String,

    /// API base URL (overridable for tests)
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip PUT updates
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("api_base", &self.api_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `zone_id`: Zone whose A records are managed
    /// - `dry_run`: If true, list records but skip PUT updates
    /// - `timeout`: Timeout applied to every request
    pub fn new(
        api_token: impl Into<String>,
        zone_id: impl Into<String>,
        dry_run: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let api_token = api_token.into();
        let zone_id = zone_id.into();

        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }
        if zone_id.is_empty() {
            return Err(Error::config("Cloudflare zone ID cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            zone_id,
            api_base: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Create a new Cloudflare provider (production/live mode)
    pub fn new_live(api_token: impl Into<String>, zone_id: impl Into<String>) -> Result<Self> {
        Self::new(api_token, zone_id, false, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a new Cloudflare provider (dry-run mode)
    pub fn new_dry_run(api_token: impl Into<String>, zone_id: impl Into<String>) -> Result<Self> {
        Self::new(api_token, zone_id, true, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create from the provider section of the configuration
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        if config.dry_run {
            tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }
        Self::new(
            config.api_token.clone(),
            config.zone_id.clone(),
            config.dry_run,
            config.timeout(),
        )
    }

    /// Point the provider at a different API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.api_base, self.zone_id)
    }

    /// Send one request and unwrap the Cloudflare envelope
    ///
    /// Every failure mode (transport, status, undecodable body,
    /// `success=false`) comes back as an `Err`.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        action: &str,
    ) -> Result<Envelope<T>> {
        let response = request
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::http(format!("{} failed: {}", action, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("{} failed reading response: {}", action, e)))?;

        if !status.is_success() {
            let details = serde_json::from_str::<Envelope<IgnoredAny>>(&body)
                .map(|env| render_errors(&env.errors))
                .unwrap_or(body);

            return Err(match status.as_u16() {
                401 | 403 => Error::auth(format!(
                    "{}: invalid API token or insufficient permissions. Status: {} - {}",
                    action, status, details
                )),
                429 => Error::rate_limited(format!("{}: Status: {} - {}", action, status, details)),
                _ => Error::provider(
                    PROVIDER,
                    format!("{} failed: {} - {}", action, status, details),
                ),
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            Error::provider(PROVIDER, format!("{}: malformed response: {}", action, e))
        })?;

        if !envelope.success {
            return Err(Error::provider(
                PROVIDER,
                format!("{}: {}", action, render_errors(&envelope.errors)),
            ));
        }

        Ok(envelope)
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// List every A record in the zone
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?type=A
    /// Authorization: Bearer <token>
    /// ```
    async fn list_a_records(&self) -> Result<Vec<DnsRecord>> {
        tracing::debug!("Listing A records for zone {}", self.zone_id);

        let request = self.client.get(self.records_url()).query(&[("type", "A")]);
        let envelope = self.send::<Vec<DnsRecord>>(request, "Fetching A records").await?;
        let records = envelope
            .result
            .ok_or_else(|| Error::provider(PROVIDER, "Fetching A records: response has no result"))?;

        // Only the first page is read
        if let Some(missing) = envelope
            .result_info
            .and_then(|info| info.unreturned(records.len()))
        {
            tracing::warn!(
                "Zone {} has {} more A record(s) than the {} returned; they will not be updated",
                self.zone_id,
                missing,
                records.len()
            );
        }

        tracing::debug!("Zone {} has {} A record(s)", self.zone_id, records.len());
        Ok(records)
    }

    /// Push one record back with its new content
    ///
    /// # API Call
    ///
    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// {"type": "A", "name": "...", "content": "1.2.3.4", "ttl": 1, "proxied": false}
    /// ```
    async fn update_record(&self, record: &DnsRecord) -> Result<()> {
        let payload = UpdatePayload::from(record);
        let url = format!("{}/{}", self.records_url(), record.id);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                url,
                serde_json::to_string(&payload)?
            );
            return Ok(());
        }

        let request = self.client.put(&url).body(serde_json::to_vec(&payload)?);
        let action = format!("Updating record {}", record.name);
        self.send::<IgnoredAny>(request, &action).await?;

        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ZONE: &str = "zone-123";
    const TOKEN: &str = "test_token";

    fn provider_for(server: &MockServer) -> CloudflareProvider {
        CloudflareProvider::new_live(TOKEN, ZONE)
            .unwrap()
            .with_api_base(server.uri())
    }

    fn record(id: &str, name: &str, content: &str, proxied: bool) -> DnsRecord {
        DnsRecord {
            id: id.to_string(),
            name: name.to_string(),
            content: content.to_string(),
            proxied,
            ttl: Some(300),
        }
    }

    #[tokio::test]
    async fn lists_a_records_in_provider_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/zones/{ZONE}/dns_records")))
            .and(query_param("type", "A"))
            .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "messages": [],
                "result": [
                    {"id": "r2", "name": "b.example.com", "type": "A", "content": "9.9.9.9", "proxied": true, "ttl": 1},
                    {"id": "r1", "name": "a.example.com", "type": "A", "content": "9.9.9.9", "proxied": false, "ttl": 300}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let records = provider.list_a_records().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "r2");
        assert!(records[0].proxied);
        assert_eq!(records[1].id, "r1");
        assert_eq!(records[1].ttl, Some(300));
    }

    #[tokio::test]
    async fn unsuccessful_envelope_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errors": [{"code": 7003, "message": "Could not route to /zones/zone-123"}],
                "result": null
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server).list_a_records().await.unwrap_err();

        assert!(matches!(err, Error::Provider { .. }));
        assert!(err.to_string().contains("7003: Could not route"));
    }

    #[tokio::test]
    async fn malformed_body_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = provider_for(&server).list_a_records().await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
        assert!(err.to_string().contains("malformed response"));
    }

    #[tokio::test]
    async fn unexpected_result_shape_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "result": {"id": "not-a-list"}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server).list_a_records().await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }

    #[tokio::test]
    async fn missing_result_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": []
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server).list_a_records().await.unwrap_err();
        assert!(err.to_string().contains("no result"));
    }

    #[tokio::test]
    async fn forbidden_maps_to_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "success": false,
                "errors": [{"code": 9109, "message": "Invalid access token"}]
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server).list_a_records().await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        assert!(err.to_string().contains("9109: Invalid access token"));
        assert!(!err.to_string().contains(TOKEN));
    }

    #[tokio::test]
    async fn too_many_requests_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = provider_for(&server).list_a_records().await.unwrap_err();
        assert!(matches!(err, Error::RateLimited(_)));
    }

    #[tokio::test]
    async fn server_error_maps_to_provider_error_with_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "success": false,
                "errors": [{"code": 10000, "message": "Internal server error"}]
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server).list_a_records().await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("10000: Internal server error"));
    }

    #[tokio::test]
    async fn bad_gateway_on_update_keeps_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .update_record(&record("r1", "a.example.com", "1.2.3.4", false))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Provider { .. }));
        assert!(err.to_string().contains("a.example.com"));
        assert!(err.to_string().contains("upstream unavailable"));
    }

    #[tokio::test]
    async fn unreachable_api_fails_updates_with_http_error() {
        let provider = CloudflareProvider::new(TOKEN, ZONE, false, Duration::from_secs(2))
            .unwrap()
            .with_api_base("http://127.0.0.1:9");

        let err = provider
            .update_record(&record("r1", "a.example.com", "1.2.3.4", false))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }

    #[tokio::test]
    async fn partial_first_page_still_returns_listed_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "result": [{"id": "r1", "name": "a.example.com", "content": "9.9.9.9"}],
                "result_info": {"page": 1, "per_page": 1, "count": 1, "total_count": 3}
            })))
            .mount(&server)
            .await;

        let records = provider_for(&server).list_a_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "r1");
    }

    #[test]
    fn result_info_counts_unreturned_records() {
        let info = ResultInfo {
            total_count: Some(250),
        };
        assert_eq!(info.unreturned(100), Some(150));
        assert_eq!(info.unreturned(250), None);
        assert_eq!(ResultInfo::default().unreturned(3), None);
    }

    #[tokio::test]
    async fn update_sends_full_payload_with_automatic_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(format!("/zones/{ZONE}/dns_records/r2")))
            .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
            .and(header("Content-Type", "application/json"))
            .and(body_json(json!({
                "type": "A",
                "name": "b.example.com",
                "content": "1.2.3.4",
                "ttl": 1,
                "proxied": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "result": {"id": "r2", "content": "1.2.3.4"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let record = record("r2", "b.example.com", "1.2.3.4", true);

        provider.update_record(&record).await.unwrap();
    }

    #[tokio::test]
    async fn update_reports_unsuccessful_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errors": [{"code": 81057, "message": "Record already exists."}]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider
            .update_record(&record("r1", "a.example.com", "1.2.3.4", false))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Provider { .. }));
        assert!(err.to_string().contains("a.example.com"));
        assert!(err.to_string().contains("81057"));
    }

    #[tokio::test]
    async fn dry_run_lists_but_never_puts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "result": [{"id": "r1", "name": "a.example.com", "content": "9.9.9.9", "proxied": false}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider = CloudflareProvider::new_dry_run(TOKEN, ZONE)
            .unwrap()
            .with_api_base(server.uri());
        assert!(provider.is_dry_run());

        let records = provider.list_a_records().await.unwrap();
        let updated = DnsRecord {
            content: "1.2.3.4".to_string(),
            ..records[0].clone()
        };
        provider.update_record(&updated).await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_api_is_an_http_error() {
        let provider = CloudflareProvider::new(TOKEN, ZONE, false, Duration::from_secs(2))
            .unwrap()
            .with_api_base("http://127.0.0.1:9");

        let err = provider.list_a_records().await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }

    #[test]
    fn payload_forces_type_and_ttl() {
        let record = record("r1", "a.example.com", "1.2.3.4", false);
        let payload = serde_json::to_value(UpdatePayload::from(&record)).unwrap();

        assert_eq!(
            payload,
            json!({
                "type": "A",
                "name": "a.example.com",
                "content": "1.2.3.4",
                "ttl": 1,
                "proxied": false
            })
        );
    }

    #[test]
    fn empty_token_or_zone_is_rejected() {
        assert!(CloudflareProvider::new_live("", ZONE).is_err());
        assert!(CloudflareProvider::new_live(TOKEN, "").is_err());
    }

    #[test]
    fn from_config_honours_dry_run() {
        let config = ProviderConfig {
            api_token: TOKEN.to_string(),
            zone_id: ZONE.to_string(),
            dry_run: true,
            timeout_secs: 30,
        };
        let provider = CloudflareProvider::from_config(&config).unwrap();
        assert!(provider.is_dry_run());
        assert_eq!(provider.provider_name(), "cloudflare");
    }

    #[test]
    fn api_token_not_exposed_in_debug() {
        let provider = CloudflareProvider::new_live("secret_token_12345", ZONE).unwrap();

        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("CloudflareProvider"));
    }

    #[test]
    fn trailing_slash_in_api_base_is_ignored() {
        let provider = CloudflareProvider::new_live(TOKEN, ZONE)
            .unwrap()
            .with_api_base("http://localhost:8080/client/v4/");
        assert_eq!(
            provider.records_url(),
            "http://localhost:8080/client/v4/zones/zone-123/dns_records"
        );
    }
}
