//! Core DDNS engine
//!
//! The DdnsEngine is the reconciliation loop. On every tick it:
//! - Resolves the current public IP via IpSource
//! - Compares it with the last known IP it holds in [`LoopState`]
//! - On a change, lists the zone's A records and updates each one via DnsProvider
//!
//! ## Architecture
//!
//! ```text
//!  ┌────────┐   tick   ┌──────────────┐  current()   ┌─────────────┐
//!  │ Ticker │─────────▶│  DdnsEngine  │─────────────▶│  IpSource   │
//!  └────────┘          │  run_cycle() │              └─────────────┘
//!                      │              │  list / update ┌─────────────┐
//!                      │  LoopState ◀─┼──────────────▶│ DnsProvider │
//!                      └──────────────┘                └─────────────┘
//! ```
//!
//! ## Failure policy
//!
//! No error escapes a cycle. A failed lookup skips the cycle with a warning,
//! a failed listing counts as an empty zone, and each record update is
//! attempted regardless of how the others went. The loop always goes back
//! to sleep and tries again on the next tick.

mod ticker;

pub use ticker::Ticker;

use crate::config::{CommitPolicy, EngineConfig};
use crate::error::Result;
use crate::state::{CycleOutcome, LoopState, UpdateReport};
use crate::traits::{DnsProvider, IpSource, PublicIp};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Core DDNS engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Start with [`DdnsEngine::run()`]
/// 3. Engine runs until SIGINT/SIGTERM is received
///
/// [`DdnsEngine::run_cycle()`] can be driven directly for embedding or
/// testing; it never sleeps.
pub struct DdnsEngine {
    /// IP source for discovering the public IP
    ip_source: Box<dyn IpSource>,

    /// DNS provider for listing and updating records
    provider: Box<dyn DnsProvider>,

    /// Delay between cycles
    check_interval: Duration,

    /// When a new IP becomes the last known IP
    commit_policy: CommitPolicy,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Parameters
    ///
    /// - `ip_source`: IP source implementation
    /// - `provider`: DNS provider implementation
    /// - `config`: Engine settings
    pub fn new(
        ip_source: Box<dyn IpSource>,
        provider: Box<dyn DnsProvider>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            ip_source,
            provider,
            check_interval: config.check_interval(),
            commit_policy: config.commit_policy,
        })
    }

    /// Run the engine
    ///
    /// Starts from an unknown last IP and loops until a shutdown signal
    /// (SIGINT/SIGTERM, or Ctrl-C on non-Unix platforms) is received.
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await.map(|_| ())
    }

    /// Run the engine with a programmatic stop
    ///
    /// Same loop as [`DdnsEngine::run()`], but stops when `shutdown_rx`
    /// fires (or its sender is dropped) instead of on OS signals. Returns
    /// the state held when the loop stopped.
    pub async fn run_with_shutdown(&self, shutdown_rx: oneshot::Receiver<()>) -> Result<LoopState> {
        self.run_internal(Some(shutdown_rx)).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<LoopState> {
        info!(
            "Starting reconciliation loop (provider={}, ip_source={}, interval={}s, commit_policy={:?})",
            self.provider.provider_name(),
            self.ip_source.source_name(),
            self.check_interval.as_secs(),
            self.commit_policy
        );

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => shutdown_signal().await,
            }
        };
        tokio::pin!(shutdown);

        let mut ticker = Ticker::new(self.check_interval);
        let mut state = LoopState::default();

        loop {
            let cycle = async {
                ticker.tick().await;
                self.run_cycle(state.clone()).await
            };

            let finished = tokio::select! {
                _ = &mut shutdown => None,
                result = cycle => Some(result),
            };

            match finished {
                Some((next, outcome)) => {
                    debug!("Cycle finished: {:?}", outcome);
                    state = next;
                }
                None => {
                    info!("Shutdown signal received, stopping reconciliation loop");
                    break;
                }
            }
        }

        Ok(state)
    }

    /// Run a single reconciliation cycle
    ///
    /// Takes the state from the previous cycle and returns the state for
    /// the next one, together with what happened. Never fails and never
    /// sleeps.
    pub async fn run_cycle(&self, state: LoopState) -> (LoopState, CycleOutcome) {
        info!("Checking external IP...");

        let ip = match self.ip_source.current().await {
            Ok(ip) => ip,
            Err(e) => {
                warn!("Could not determine external IP ({}). Skipping this cycle.", e);
                return (
                    state,
                    CycleOutcome::ResolveFailed {
                        error: e.to_string(),
                    },
                );
            }
        };

        if !state.is_change(&ip) {
            match state.last_changed_at {
                Some(since) => info!(
                    "IP address {} has not changed since {}. No updates needed.",
                    ip,
                    since.to_rfc3339()
                ),
                None => info!("IP address {} has not changed. No updates needed.", ip),
            }
            return (state, CycleOutcome::Unchanged { ip });
        }

        let previous = state.last_ip.clone();
        match (&previous, state.last_changed_at) {
            (Some(prev), Some(since)) => info!(
                "IP has changed from {} (held since {}) to {}. Updating A records...",
                prev,
                since.to_rfc3339(),
                ip
            ),
            (Some(prev), None) => {
                info!("IP has changed from {} to {}. Updating A records...", prev, ip)
            }
            (None, _) => info!("IP is {}. Updating A records...", ip),
        }

        let report = self.apply(&ip).await;
        info!(
            "Update pass finished: {} listed, {} updated, {} failed",
            report.listed,
            report.updated,
            report.failed.len()
        );

        let committed = match self.commit_policy {
            CommitPolicy::Always => true,
            CommitPolicy::OnSuccess => report.is_complete(),
        };

        let state = if committed {
            state.commit(ip.clone())
        } else {
            warn!(
                "Not recording {} as the last known IP; the next cycle will retry the update pass",
                ip
            );
            state
        };

        (
            state,
            CycleOutcome::Applied {
                ip,
                previous,
                report,
                committed,
            },
        )
    }

    /// List the zone's A records and point each one at `ip`
    async fn apply(&self, ip: &PublicIp) -> UpdateReport {
        let mut report = UpdateReport::default();

        let records = match self.provider.list_a_records().await {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to fetch A records: {}", e);
                report.list_failed = true;
                Vec::new()
            }
        };
        report.listed = records.len();
        debug!("Fetched {} A record(s)", records.len());

        let dry_run = self.provider.is_dry_run();

        for listed in records {
            let record = listed.with_content(ip);

            match self.provider.update_record(&record).await {
                Ok(()) => {
                    // The provider already logged what it would have sent
                    if !dry_run {
                        info!("Successfully updated record {} to IP {}", record.name, record.content);
                    }
                    report.updated += 1;
                }
                Err(e) => {
                    error!("Failed to update record {}: {}", record.name, e);
                    report.failed.push(record.name);
                }
            }
        }

        report
    }
}

/// Wait for SIGINT or SIGTERM
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to install signal handlers: {}", e);
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
}

/// Wait for Ctrl-C
#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to wait for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
