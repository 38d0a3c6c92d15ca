//! Configuration types for the DDNS system
//!
//! This module defines all configuration structures used throughout the crate,
//! and how they are read from the environment.
//!
//! Loading goes through [`DdnsConfig::from_lookup`], which takes any
//! `key -> value` function. The daemon passes `std::env::var`; tests pass a
//! map, so nothing here touches the real process environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Endpoint returning the caller's public IP as plain text
pub const ENV_IP_LOOKUP_URL: &str = "IP_LOOKUP_URL";
/// Bearer credential for the DNS provider
pub const ENV_API_TOKEN: &str = "CLOUDFLARE_API_TOKEN";
/// Target zone identifier
pub const ENV_ZONE_ID: &str = "CLOUDFLARE_ZONE_ID";
/// Seconds to sleep between cycles
pub const ENV_CHECK_INTERVAL_SECS: &str = "DDNS_CHECK_INTERVAL_SECS";
/// `always` or `on-success`, see [`CommitPolicy`]
pub const ENV_COMMIT_POLICY: &str = "DDNS_COMMIT_POLICY";
/// `live` or `dry-run`
pub const ENV_MODE: &str = "DDNS_MODE";

/// Default IP lookup endpoint
pub const DEFAULT_IP_LOOKUP_URL: &str = "https://api.ipify.org";

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// IP source configuration
    pub ip_source: IpSourceConfig,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl DdnsConfig {
    /// Build the configuration from a variable lookup function
    ///
    /// Empty values count as absent. Both the API token and the zone ID are
    /// required; if either is missing the error names every missing variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, crate::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_token = get(ENV_API_TOKEN);
        let zone_id = get(ENV_ZONE_ID);

        let (api_token, zone_id) = match (api_token, zone_id) {
            (Some(token), Some(zone)) => (token, zone),
            (token, zone) => {
                let missing: Vec<&str> = [
                    token.is_none().then_some(ENV_API_TOKEN),
                    zone.is_none().then_some(ENV_ZONE_ID),
                ]
                .into_iter()
                .flatten()
                .collect();
                return Err(crate::Error::config(format!(
                    "{} must be set as environment variables",
                    missing.join(" and ")
                )));
            }
        };

        let dry_run = match get(ENV_MODE).as_deref() {
            None | Some("live") => false,
            Some("dry-run") => true,
            Some(other) => {
                return Err(crate::Error::config(format!(
                    "{ENV_MODE} '{other}' is not valid. Valid modes: live, dry-run"
                )));
            }
        };

        let check_interval_secs = match get(ENV_CHECK_INTERVAL_SECS) {
            None => default_check_interval_secs(),
            Some(raw) => raw.parse().map_err(|_| {
                crate::Error::config(format!(
                    "{ENV_CHECK_INTERVAL_SECS} must be a whole number of seconds. Got: {raw}"
                ))
            })?,
        };

        let commit_policy = match get(ENV_COMMIT_POLICY) {
            None => CommitPolicy::default(),
            Some(raw) => raw.parse()?,
        };

        let config = Self {
            ip_source: IpSourceConfig {
                url: get(ENV_IP_LOOKUP_URL).unwrap_or_else(|| DEFAULT_IP_LOOKUP_URL.to_string()),
                ..IpSourceConfig::default()
            },
            provider: ProviderConfig {
                api_token,
                zone_id,
                dry_run,
                ..ProviderConfig::default()
            },
            engine: EngineConfig {
                check_interval_secs,
                commit_policy,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Build the configuration from the process environment
    pub fn from_env() -> Result<Self, crate::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.ip_source.validate()?;
        self.provider.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// IP source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpSourceConfig {
    /// URL to fetch the public IP from
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_ip_timeout_secs")]
    pub timeout_secs: u64,
}

impl IpSourceConfig {
    /// Validate the IP source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.url.is_empty() {
            return Err(crate::Error::config("IP lookup URL cannot be empty"));
        }
        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "{ENV_IP_LOOKUP_URL} must use HTTP or HTTPS scheme. Got: {}",
                self.url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("IP lookup timeout must be > 0"));
        }
        Ok(())
    }

    /// Request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for IpSourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_IP_LOOKUP_URL.to_string(),
            timeout_secs: default_ip_timeout_secs(),
        }
    }
}

/// DNS provider configuration (Cloudflare)
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Cloudflare API token
    pub api_token: String,

    /// Zone whose A records are managed
    pub zone_id: String,

    /// List records but only log the updates that would be sent
    #[serde(default)]
    pub dry_run: bool,

    /// Timeout applied to every provider API call, in seconds
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_token.is_empty() {
            return Err(crate::Error::config("Cloudflare API token cannot be empty"));
        }
        if self.zone_id.is_empty() {
            return Err(crate::Error::config("Cloudflare zone ID cannot be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Provider API timeout must be > 0"));
        }
        Ok(())
    }

    /// Request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            zone_id: String::new(),
            dry_run: false,
            timeout_secs: default_api_timeout_secs(),
        }
    }
}

// Custom Debug implementation that hides the API token
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("dry_run", &self.dry_run)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// When the engine records a newly detected IP as the last known IP
///
/// The loop only lists and updates records when the resolved IP differs
/// from the last known one, so this decides whether failed updates are
/// retried on the next cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitPolicy {
    /// Record the new IP after every update pass, even if every update
    /// failed. Failed records stay stale until the IP changes again.
    #[default]
    Always,

    /// Record the new IP only if listing and every update succeeded.
    /// Otherwise the next cycle sees a change again and repeats the pass.
    OnSuccess,
}

impl std::str::FromStr for CommitPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "on-success" => Ok(Self::OnSuccess),
            _ => Err(crate::Error::config(format!(
                "{ENV_COMMIT_POLICY} '{s}' is not valid. Valid policies: always, on-success"
            ))),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Delay between the end of one cycle and the start of the next (in seconds)
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// When a newly detected IP becomes the last known IP
    #[serde(default)]
    pub commit_policy: CommitPolicy,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.check_interval_secs == 0 {
            return Err(crate::Error::config("Check interval must be > 0"));
        }
        Ok(())
    }

    /// Check interval as a `Duration`
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            commit_policy: CommitPolicy::default(),
        }
    }
}

fn default_check_interval_secs() -> u64 {
    3600
}

fn default_ip_timeout_secs() -> u64 {
    10
}

fn default_api_timeout_secs() -> u64 {
    30
}
