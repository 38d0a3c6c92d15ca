//! Test doubles and common utilities for reconciliation contract tests
//!
//! The doubles are cheap to clone and share their counters through `Arc`,
//! so a test can hand one copy to the engine and keep another to inspect.

#![allow(dead_code)]

use ddns_core::config::EngineConfig;
use ddns_core::error::{Error, Result};
use ddns_core::traits::{DnsProvider, DnsRecord, IpSource, PublicIp};
use ddns_core::{CommitPolicy, DdnsEngine};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// An IpSource that plays back a script of answers
///
/// `Some(ip)` answers with that IP, `None` simulates a timeout. Once the
/// script runs out the last answer is repeated.
#[derive(Clone)]
pub struct ScriptedIpSource {
    script: Arc<Mutex<VecDeque<Option<String>>>>,
    last: Arc<Mutex<Option<String>>>,
    call_count: Arc<AtomicUsize>,
}

impl ScriptedIpSource {
    pub fn new(script: &[Option<&str>]) -> Self {
        Self {
            script: Arc::new(Mutex::new(
                script.iter().map(|s| s.map(str::to_string)).collect(),
            )),
            last: Arc::new(Mutex::new(None)),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always answers with `ip`
    pub fn fixed(ip: &str) -> Self {
        Self::new(&[Some(ip)])
    }

    /// Always times out
    pub fn unreachable() -> Self {
        Self::new(&[None])
    }

    /// Get the number of times current() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpSource for ScriptedIpSource {
    async fn current(&self) -> Result<PublicIp> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let answer = {
            let mut script = self.script.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = script.pop_front() {
                *last = next;
            }
            last.clone()
        };

        match answer {
            Some(ip) => PublicIp::new(ip).ok_or_else(|| Error::ip_source("empty response")),
            None => Err(Error::http("request timed out")),
        }
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// A DnsProvider that serves a fixed zone and records every call
#[derive(Clone)]
pub struct MockDnsProvider {
    zone: Arc<Vec<DnsRecord>>,
    failing_ids: Arc<Mutex<HashSet<String>>>,
    list_fails: Arc<AtomicBool>,
    dry_run: Arc<AtomicBool>,
    list_call_count: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<DnsRecord>>>,
}

impl MockDnsProvider {
    pub fn new(zone: Vec<DnsRecord>) -> Self {
        Self {
            zone: Arc::new(zone),
            failing_ids: Arc::new(Mutex::new(HashSet::new())),
            list_fails: Arc::new(AtomicBool::new(false)),
            dry_run: Arc::new(AtomicBool::new(false)),
            list_call_count: Arc::new(AtomicUsize::new(0)),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make updates to the record with this ID fail
    pub fn fail_updates_for(&self, id: &str) {
        self.failing_ids.lock().unwrap().insert(id.to_string());
    }

    /// Let updates to the record with this ID succeed again
    pub fn heal_updates_for(&self, id: &str) {
        self.failing_ids.lock().unwrap().remove(id);
    }

    /// Make the listing call fail (or succeed again)
    pub fn set_list_fails(&self, fails: bool) {
        self.list_fails.store(fails, Ordering::SeqCst);
    }

    /// Report the provider as log-only
    pub fn set_dry_run(&self, dry_run: bool) {
        self.dry_run.store(dry_run, Ordering::SeqCst);
    }

    /// Get the number of times list_a_records() was called
    pub fn list_call_count(&self) -> usize {
        self.list_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times update_record() was called
    pub fn update_call_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Every record passed to update_record(), in call order
    pub fn sent_records(&self) -> Vec<DnsRecord> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn list_a_records(&self) -> Result<Vec<DnsRecord>> {
        self.list_call_count.fetch_add(1, Ordering::SeqCst);
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(Error::provider("mock", "success=false"));
        }
        Ok(self.zone.as_ref().clone())
    }

    async fn update_record(&self, record: &DnsRecord) -> Result<()> {
        self.sent.lock().unwrap().push(record.clone());
        if self.failing_ids.lock().unwrap().contains(&record.id) {
            return Err(Error::provider("mock", format!("update of {} rejected", record.id)));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run.load(Ordering::SeqCst)
    }
}

pub fn record(id: &str, name: &str, content: &str, proxied: bool) -> DnsRecord {
    DnsRecord {
        id: id.to_string(),
        name: name.to_string(),
        content: content.to_string(),
        proxied,
        ttl: Some(300),
    }
}

/// The two-record zone used throughout the contract tests
pub fn two_record_zone() -> Vec<DnsRecord> {
    vec![
        record("r1", "a.example.com", "9.9.9.9", false),
        record("r2", "b.example.com", "9.9.9.9", true),
    ]
}

pub fn ip(s: &str) -> PublicIp {
    PublicIp::new(s).unwrap()
}

pub fn engine_config(commit_policy: CommitPolicy) -> EngineConfig {
    EngineConfig {
        check_interval_secs: 3600,
        commit_policy,
    }
}

/// Build an engine over clones of the given doubles
pub fn engine(source: &ScriptedIpSource, provider: &MockDnsProvider) -> DdnsEngine {
    engine_with_policy(source, provider, CommitPolicy::Always)
}

pub fn engine_with_policy(
    source: &ScriptedIpSource,
    provider: &MockDnsProvider,
    commit_policy: CommitPolicy,
) -> DdnsEngine {
    DdnsEngine::new(
        Box::new(source.clone()),
        Box::new(provider.clone()),
        engine_config(commit_policy),
    )
    .expect("engine construction succeeds")
}
