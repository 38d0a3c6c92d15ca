//! Loop state and cycle outcomes
//!
//! The engine owns exactly one piece of mutable state for the life of the
//! process: the last IP it applied. It is passed into each cycle and handed
//! back, never stored globally, so a single cycle can be driven and checked
//! in isolation.
//!
//! Nothing here is persisted. After a restart the last known IP is unknown
//! again and the first successful lookup triggers a full update pass.

use chrono::{DateTime, Utc};

use crate::traits::PublicIp;

/// State carried from one reconciliation cycle to the next
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopState {
    /// The last IP an update pass was run for (`None` until the first one)
    pub last_ip: Option<PublicIp>,

    /// When `last_ip` was last changed
    pub last_changed_at: Option<DateTime<Utc>>,
}

impl LoopState {
    /// State with a known last IP (mostly useful for tests and embedding)
    pub fn with_last_ip(ip: PublicIp) -> Self {
        Self {
            last_ip: Some(ip),
            last_changed_at: Some(Utc::now()),
        }
    }

    /// Whether `ip` differs from the last known IP
    ///
    /// An unknown last IP always counts as a change.
    pub fn is_change(&self, ip: &PublicIp) -> bool {
        self.last_ip.as_ref() != Some(ip)
    }

    /// Record `ip` as the last known IP
    pub(crate) fn commit(self, ip: PublicIp) -> Self {
        Self {
            last_ip: Some(ip),
            last_changed_at: Some(Utc::now()),
        }
    }
}

/// Tally of one update pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Records returned by the listing call
    pub listed: usize,

    /// Records whose update call succeeded
    pub updated: usize,

    /// Names of records whose update call failed
    pub failed: Vec<String>,

    /// Whether the listing call itself failed (records treated as empty)
    pub list_failed: bool,
}

impl UpdateReport {
    /// Listing succeeded and no update failed
    pub fn is_complete(&self) -> bool {
        !self.list_failed && self.failed.is_empty()
    }
}

/// What a single reconciliation cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The public IP could not be determined; nothing else happened
    ResolveFailed {
        /// Rendered resolver error
        error: String,
    },

    /// The public IP matched the last known IP; nothing else happened
    Unchanged {
        /// The current IP
        ip: PublicIp,
    },

    /// The public IP was new, so records were listed and updated
    Applied {
        /// The newly resolved IP
        ip: PublicIp,
        /// The last known IP before this cycle
        previous: Option<PublicIp>,
        /// Per-record results
        report: UpdateReport,
        /// Whether `ip` became the last known IP
        committed: bool,
    },
}
