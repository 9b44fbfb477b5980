use thiserror::Error;

/// Error type for the `radvlan-proto` crate.
///
/// Decode failures are all "malformed packet" conditions: the server drops
/// the datagram without a reply. Encode failures only happen when a caller
/// tries to build a packet that cannot be represented on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // ── Decode ──────────────────────────────────────────────────────
    /// Datagram shorter than the fixed 20-byte header.
    #[error("Packet truncated: {len} bytes, need at least 20")]
    Truncated { len: usize },

    /// Length field below the header size, above 4096, or larger than
    /// the datagram that carried it.
    #[error("Invalid length field {declared} for a {received}-byte datagram")]
    InvalidLength { declared: usize, received: usize },

    /// Attribute TLV with a length below 2 or running past the packet end.
    #[error("Attribute at offset {offset} has invalid length {length}")]
    InvalidAttribute { offset: usize, length: usize },

    /// Code octet is not one this server understands.
    #[error("Unsupported packet code {0}")]
    UnsupportedCode(u8),

    // ── Encode ──────────────────────────────────────────────────────
    /// Encoded packet would exceed the 4096-byte protocol limit.
    #[error("Packet of {len} bytes exceeds the 4096-byte limit")]
    PacketTooLarge { len: usize },

    /// Attribute value longer than the 253 bytes a TLV can carry.
    #[error("Attribute {kind} value of {len} bytes exceeds 253 bytes")]
    AttributeTooLong { kind: u8, len: usize },

    // ── Authenticators ──────────────────────────────────────────────
    /// Request or response authenticator does not match the shared secret.
    #[error("Authenticator mismatch")]
    AuthenticatorMismatch,

    /// Message-Authenticator HMAC does not match the shared secret.
    #[error("Message-Authenticator mismatch")]
    MessageAuthenticatorMismatch,

    /// Message-Authenticator attribute present with the wrong size.
    #[error("Message-Authenticator must be 16 bytes, got {0}")]
    InvalidMessageAuthenticator(usize),

    /// HMAC key could not be initialised from the shared secret.
    #[error("Shared secret rejected by the HMAC implementation")]
    InvalidSecret,
}

impl Error {
    /// Returns `true` for errors raised while parsing an inbound datagram.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. }
                | Self::InvalidLength { .. }
                | Self::InvalidAttribute { .. }
                | Self::UnsupportedCode(_)
                | Self::InvalidMessageAuthenticator(_)
        )
    }

    /// Returns `true` if the packet parsed but failed a secret check.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::AuthenticatorMismatch | Self::MessageAuthenticatorMismatch
        )
    }
}
