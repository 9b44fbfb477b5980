//! MAC-authentication engine behind the radvlan RADIUS server.
//!
//! Everything between "datagram received" and "reply sent, audit row
//! written" lives here:
//!
//! - **[`Server`]**: binds the authentication (and optional accounting)
//!   listeners and runs one task per datagram until cancelled.
//! - **[`AuthHandler`]**: the per-request pipeline: decode, client secret
//!   lookup, duplicate check, MAC extraction, resolution, reply, audit.
//! - **[`Resolver`]**: tiered lookup against a [`PolicyStore`]:
//!   exact MAC, then vendor prefix, then the enabled default, else reject.
//!   Store failures and out-of-range VLANs fail closed.
//! - **[`ClientRegistry`]**: source address to shared secret, with an
//!   explicit accept-any mode for lab setups.
//! - **Stores** ([`store`]): [`MySqlStore`] for production and
//!   [`MemoryStore`] for tests and demos, behind async traits.
//! - **Domain model** ([`model`]): [`MacAddress`], [`VlanId`],
//!   [`Outcome`], [`AuditRecord`].

pub mod audit;
pub mod clients;
pub mod config;
pub mod dedup;
pub mod error;
pub mod handler;
pub mod model;
pub mod reply;
pub mod resolve;
pub mod server;
pub mod store;
pub mod transmit;

// ── Primary re-exports ──────────────────────────────────────────────
pub use audit::AuditLogger;
pub use clients::{ClientMatch, ClientRegistry, NasClient};
pub use config::{RetryPolicy, ServerConfig};
pub use dedup::{Admission, ReplayCache, RequestKey};
pub use error::{CoreError, InvalidMac, InvalidVlan, StoreError};
pub use handler::{AcctHandler, AuthHandler, DatagramHandler, Disposition, DropReason};
pub use reply::{Reply, build_reply};
pub use resolve::Resolver;
pub use server::Server;
pub use store::{AuditSink, DefaultPolicy, MemoryStore, MySqlSettings, MySqlStore, PolicyStore};
pub use transmit::{DatagramSocket, Transmitter};

pub use model::{
    AuditRecord, AuthRequest, DEFAULT_KEY, MacAddress, MacPrefix, MatchKind, Outcome,
    RejectReason, VlanId,
};
