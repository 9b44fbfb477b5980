// ── Core error types ──
//
// Per-packet failures end in a silent drop: no reply, one log line.
// Policy-store failures never surface here; the resolver turns them into
// explicit rejects. Startup failures (bind, store connect, configuration)
// are fatal and bubble up to the binary.

use std::io;
use std::net::{IpAddr, SocketAddr};

use radvlan_proto::Code;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Per-packet errors ────────────────────────────────────────────
    #[error("Malformed packet: {0}")]
    MalformedPacket(radvlan_proto::Error),

    #[error("Unexpected {code} on this port")]
    UnexpectedCode { code: Code },

    #[error("Request from unknown client {address}")]
    UnknownClient { address: IpAddr },

    #[error("Authenticator check failed for {address}: {reason}")]
    AuthenticatorMismatch { address: IpAddr, reason: radvlan_proto::Error },

    #[error(transparent)]
    InvalidMac(#[from] InvalidMac),

    #[error("Could not encode reply: {0}")]
    Encode(radvlan_proto::Error),

    #[error("Send to {destination} failed: {reason}")]
    Transmit {
        destination: SocketAddr,
        reason: String,
    },

    // ── Policy store errors ──────────────────────────────────────────
    #[error(transparent)]
    Store(#[from] StoreError),

    // ── Startup errors ───────────────────────────────────────────────
    #[error("Cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Short machine-friendly label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPacket(_) => "malformed",
            Self::UnexpectedCode { .. } => "unexpected_code",
            Self::UnknownClient { .. } => "unknown_client",
            Self::AuthenticatorMismatch { .. } => "authenticator",
            Self::InvalidMac(_) => "invalid_mac",
            Self::Encode(_) => "encode",
            Self::Transmit { .. } => "transmit",
            Self::Store(_) => "store",
            Self::Bind { .. } => "bind",
            Self::Config { .. } => "config",
        }
    }
}

// ── Validation errors ────────────────────────────────────────────────

/// A MAC candidate that does not contain exactly twelve hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid MAC address format: {raw}")]
pub struct InvalidMac {
    raw: String,
}

impl InvalidMac {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The input exactly as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// A stored VLAN value outside `1..=4094` or not a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("VLAN {value} is outside the assignable range 1..=4094")]
pub struct InvalidVlan {
    value: String,
}

impl InvalidVlan {
    pub fn new(value: impl ToString) -> Self {
        Self {
            value: value.to_string(),
        }
    }
}

// ── Store errors ─────────────────────────────────────────────────────

/// Failure reported by a policy store or audit sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Backend unreachable, pool exhausted, or query failed in transit.
    #[error("Policy store unavailable: {reason}")]
    Unavailable { reason: String },

    /// Backend answered with data that cannot be a policy.
    #[error("Policy store returned invalid data: {message}")]
    Integrity { message: String },
}

impl From<InvalidVlan> for StoreError {
    fn from(err: InvalidVlan) -> Self {
        Self::Integrity {
            message: err.to_string(),
        }
    }
}

// ── Conversion from codec errors ─────────────────────────────────────

impl From<radvlan_proto::Error> for CoreError {
    fn from(err: radvlan_proto::Error) -> Self {
        if err.is_malformed() {
            Self::MalformedPacket(err)
        } else {
            Self::Encode(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_errors_split_into_malformed_and_encode() {
        let malformed = CoreError::from(radvlan_proto::Error::Truncated { len: 3 });
        assert_eq!(malformed.kind(), "malformed");

        let encode = CoreError::from(radvlan_proto::Error::PacketTooLarge { len: 5000 });
        assert_eq!(encode.kind(), "encode");
    }

    #[test]
    fn invalid_vlan_maps_to_integrity() {
        let err = StoreError::from(InvalidVlan::new(4095));
        assert_eq!(
            err,
            StoreError::Integrity {
                message: "VLAN 4095 is outside the assignable range 1..=4094".into()
            }
        );
    }
}
