// ── In-memory policy store ──
//
// Lock-free policy tables for tests, demos and `store.backend = "memory"`.
// Also records every audit row and can simulate an outage or a slow
// backend.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use dashmap::DashMap;

use super::{AuditSink, DefaultPolicy, PolicyStore};
use crate::error::StoreError;
use crate::model::{AuditRecord, MacAddress, MacPrefix};

#[derive(Default)]
pub struct MemoryStore {
    exact: DashMap<MacAddress, i64>,
    prefixes: DashMap<MacPrefix, i64>,
    default_policy: ArcSwapOption<DefaultPolicy>,
    audit: Mutex<Vec<AuditRecord>>,
    lookups: AtomicUsize,
    unavailable: AtomicBool,
    audit_failing: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Policy tables ────────────────────────────────────────────────

    pub fn insert_exact(&self, mac: MacAddress, vlan: i64) {
        self.exact.insert(mac, vlan);
    }

    pub fn insert_prefix(&self, prefix: MacPrefix, vlan: i64) {
        self.prefixes.insert(prefix, vlan);
    }

    /// Replace the default policy; the newest write always wins.
    pub fn set_default(&self, vlan: i64, enabled: bool) {
        self.default_policy
            .store(Some(Arc::new(DefaultPolicy { vlan, enabled })));
    }

    pub fn clear_default(&self) {
        self.default_policy.store(None);
    }

    // ── Fault injection ──────────────────────────────────────────────

    /// Make every policy lookup fail as if the backend were down.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Make audit appends fail.
    pub fn set_audit_failing(&self, failing: bool) {
        self.audit_failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every lookup and append by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    // ── Inspection ───────────────────────────────────────────────────

    /// Audit rows appended so far, oldest first.
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Policy lookups served (including failed ones).
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), StoreError> {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "memory store marked unavailable".into(),
            });
        }
        Ok(())
    }

    async fn lookup(&self) -> Result<(), StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.enter().await
    }
}

#[async_trait]
impl PolicyStore for MemoryStore {
    async fn exact_vlan(&self, mac: &MacAddress) -> Result<Option<i64>, StoreError> {
        self.lookup().await?;
        Ok(self.exact.get(mac).map(|v| *v))
    }

    async fn prefix_vlan(&self, prefix: &MacPrefix) -> Result<Option<i64>, StoreError> {
        self.lookup().await?;
        Ok(self.prefixes.get(prefix).map(|v| *v))
    }

    async fn default_policy(&self) -> Result<Option<DefaultPolicy>, StoreError> {
        self.lookup().await?;
        Ok(self.default_policy.load_full().map(|p| *p))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.enter().await
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn append_audit(&self, record: &AuditRecord) -> Result<(), StoreError> {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if self.audit_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "audit sink marked failing".into(),
            });
        }
        self.audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
