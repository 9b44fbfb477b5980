//! RADIUS wire codec for the radvlan MAC-authentication server.
//!
//! This crate knows bytes, not policy:
//!
//! - **[`Packet`]**: decode a datagram into code, identifier,
//!   authenticator and an ordered attribute list; encode a packet back,
//!   deriving response / accounting authenticators and the
//!   Message-Authenticator from a shared secret.
//! - **[`Attribute`]** / **[`AttributeType`]**: typed TLVs for the small
//!   dictionary MAC authentication needs. Unknown types are preserved
//!   verbatim so nothing a NAS sends is silently dropped.
//! - **[`authenticator`]**: the MD5 / HMAC-MD5 primitives behind the above.
//!
//! `radvlan-core` maps [`Error`] into its per-packet error taxonomy.

pub mod attribute;
pub mod authenticator;
pub mod error;
pub mod packet;

pub use attribute::{
    Attribute, AttributeType, MAX_VALUE_LEN, TUNNEL_MEDIUM_IEEE_802, TUNNEL_TYPE_VLAN,
};
pub use authenticator::{AUTHENTICATOR_LEN, Authenticator, random_authenticator};
pub use error::Error;
pub use packet::{Code, HEADER_LEN, MAX_PACKET_LEN, Packet};
