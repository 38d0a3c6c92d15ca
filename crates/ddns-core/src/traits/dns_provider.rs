// # DNS Provider Trait
//
// Defines the interface for listing and updating a zone's A records via a
// provider API.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::DnsProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     for record in provider.list_a_records().await? {
//         let record = record.with_content(&new_ip);
//         provider.update_record(&record).await?;
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ip_source::PublicIp;

/// An A record as listed by the provider
///
/// Records are read fresh on every update pass and discarded after the
/// update attempt. Nothing here is cached between cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Provider-specific record identifier, used to address updates
    pub id: String,

    /// Fully-qualified hostname
    pub name: String,

    /// Current record content (the IP the record points at)
    pub content: String,

    /// Whether traffic is routed through the provider's edge network
    #[serde(default)]
    pub proxied: bool,

    /// TTL as reported by the provider. Never sent back: updates always
    /// use the provider's automatic TTL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

impl DnsRecord {
    /// Copy of this record pointing at `ip`; every other field is kept
    pub fn with_content(&self, ip: &PublicIp) -> Self {
        Self {
            content: ip.to_string(),
            ..self.clone()
        }
    }
}

/// Trait for DNS provider implementations
///
/// The zone and credential are bound when the provider is built, so the
/// operations take no zone argument.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads
/// - ❌ Retry, back off or sleep (owned by `DdnsEngine`)
/// - ❌ Cache records beyond a single request
/// - ❌ Decide whether an update is needed (owned by `DdnsEngine`)
///
/// Each method performs exactly one API call.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List every A record in the configured zone
    ///
    /// Order is whatever the provider returns.
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<DnsRecord>)`: The zone's A records (possibly empty)
    /// - `Err(Error)`: Transport failure, non-2xx status, `success=false`
    ///   envelope or a malformed response body
    async fn list_a_records(&self) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Push one record back to the provider
    ///
    /// `record.content` must already hold the desired IP. `name`, `proxied`
    /// and `id` are sent unchanged; the TTL is always the provider's
    /// automatic value.
    async fn update_record(&self, record: &DnsRecord) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;

    /// Whether `update_record` only logs instead of writing
    fn is_dry_run(&self) -> bool {
        false
    }
}
