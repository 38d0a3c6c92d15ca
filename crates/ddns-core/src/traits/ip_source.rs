// # IP Source Trait
//
// Defines the interface for discovering the host's current public IP.
//
// ## Implementations
//
// - HTTP echo endpoint (ipify and friends): `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::IpSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//
//     let ip = source.current().await?;
//     println!("public IP: {ip}");
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The caller's public IP address as reported by the lookup endpoint
///
/// This is deliberately opaque text: it is trimmed and must be non-empty,
/// but it is not parsed. Two values are the same IP only if their text is
/// identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicIp(String);

impl PublicIp {
    /// Build a `PublicIp` from raw response text
    ///
    /// Surrounding whitespace is stripped. Returns `None` if nothing is left.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The address text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PublicIp {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PublicIp {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| crate::Error::ip_source("IP address cannot be empty"))
    }
}

impl From<PublicIp> for String {
    fn from(ip: PublicIp) -> Self {
        ip.0
    }
}

/// Trait for IP source implementations
///
/// # Trust Level: Semi-Trusted
///
/// IP sources only observe. They perform one lookup per call to
/// [`IpSource::current`] and never decide whether DNS should change.
///
/// ## Forbidden Capabilities
/// - ❌ Perform DNS updates (use `DnsProvider`)
/// - ❌ Cache a previous answer (the engine owns the last known IP)
/// - ❌ Retry or sleep (the engine owns scheduling)
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Look up the current public IP
    ///
    /// # Returns
    ///
    /// - `Ok(PublicIp)`: The current public IP
    /// - `Err(Error)`: Transport error, timeout, non-2xx status or empty body
    async fn current(&self) -> Result<PublicIp, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}
