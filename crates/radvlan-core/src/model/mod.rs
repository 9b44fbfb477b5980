// ── Domain model ──
//
// Canonical types shared by the resolver, the reply builder, the audit
// trail and the stores.

pub mod audit;
pub mod mac;
pub mod outcome;
pub mod request;
pub mod vlan;

pub use audit::AuditRecord;
pub use mac::{MacAddress, MacPrefix};
pub use outcome::{DEFAULT_KEY, MatchKind, Outcome, RejectReason};
pub use request::{AuthRequest, UNKNOWN_USER, mac_candidate};
pub use vlan::VlanId;
