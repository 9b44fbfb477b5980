// ── Policy storage ──
//
// The engine reads policy through `PolicyStore` and writes audit rows
// through `AuditSink`. Stores hand back raw values; the resolver owns
// VLAN range validation so every backend is held to the same rule.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{AuditRecord, MacAddress, MacPrefix};

pub use memory::MemoryStore;
pub use mysql::{MySqlSettings, MySqlStore};

/// Latest default-VLAN policy row, unvalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultPolicy {
    pub vlan: i64,
    pub enabled: bool,
}

/// Read side of the policy store.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// VLAN assigned to exactly this MAC.
    async fn exact_vlan(&self, mac: &MacAddress) -> Result<Option<i64>, StoreError>;

    /// VLAN assigned to this vendor prefix.
    async fn prefix_vlan(&self, prefix: &MacPrefix) -> Result<Option<i64>, StoreError>;

    /// Most recent default policy, if one has ever been written.
    async fn default_policy(&self) -> Result<Option<DefaultPolicy>, StoreError>;

    /// Cheap reachability check used at startup.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Append-only audit trail.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append_audit(&self, record: &AuditRecord) -> Result<(), StoreError>;
}
