// # ddnsd - DDNS Daemon
//
// The ddnsd daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from the environment (and an optional `.env` file)
// 2. Initializing logging
// 3. Building the IP source, the Cloudflare provider and the engine
// 4. Running the reconciliation loop until SIGINT/SIGTERM
//
// All DDNS logic lives in ddns-core.
//
// ## Configuration
//
// - `CLOUDFLARE_API_TOKEN`: API token (required)
// - `CLOUDFLARE_ZONE_ID`: Zone whose A records are managed (required)
// - `IP_LOOKUP_URL`: Plain-text IP echo endpoint (default: https://api.ipify.org)
// - `DDNS_CHECK_INTERVAL_SECS`: Delay between checks (default: 3600)
// - `DDNS_COMMIT_POLICY`: `always` or `on-success` (default: always)
// - `DDNS_MODE`: `live` or `dry-run` (default: live)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export CLOUDFLARE_API_TOKEN=your_token
// export CLOUDFLARE_ZONE_ID=your_zone_id
//
// ddnsd
// ```

use anyhow::Result;
use ddns_core::{DdnsConfig, DdnsEngine};
use ddns_ip_http::HttpIpSource;
use ddns_provider_cloudflare::CloudflareProvider;
use std::env;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Parse `DDNS_LOG_LEVEL` (unset or blank means info)
fn log_level_from_env() -> Result<Level> {
    let raw = env::var("DDNS_LOG_LEVEL")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "info".to_string());
    match raw.trim().to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "DDNS_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            raw
        ),
    }
}

/// Load `.env` from the working directory (or a parent)
///
/// A missing file is fine; the environment may already be set. A file
/// that exists but cannot be read or parsed is an error, since dotenvy
/// stops at the first bad line and later variables would go missing.
fn load_dotenv() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => anyhow::bail!("Failed to load .env file: {}", e),
    }
}

/// Build the engine and its collaborators
///
/// Performs no network activity.
fn build_engine(config: DdnsConfig) -> ddns_core::Result<DdnsEngine> {
    let ip_source = HttpIpSource::from_config(&config.ip_source)?;
    let provider = CloudflareProvider::from_config(&config.provider)?;

    info!("IP lookup URL: {}", ip_source.url());
    info!("Managing A records in zone {}", config.provider.zone_id);

    DdnsEngine::new(Box::new(ip_source), Box::new(provider), config.engine)
}

fn main() -> ExitCode {
    if let Err(e) = load_dotenv() {
        eprintln!("Configuration error: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let log_level = match log_level_from_env() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    // Load configuration from environment
    let config = match DdnsConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    info!("Starting ddnsd daemon");

    let engine = match build_engine(config) {
        Ok(engine) => engine,
        Err(e) if e.is_fatal() => {
            error!("Startup error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
        Err(e) => {
            error!("Unexpected startup failure: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    // One thread: the loop is strictly sequential
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = engine.run().await {
            error!("Daemon error: {}", e);
            DdnsExitCode::RuntimeError
        } else {
            info!("Shutting down daemon");
            DdnsExitCode::CleanShutdown
        }
    });

    result.into()
}
