//! Authenticator derivation and checks.
//!
//! - Response authenticator (RFC 2865 §3): `MD5(code ∥ id ∥ length ∥
//!   request-authenticator ∥ attributes ∥ secret)`.
//! - Accounting-Request authenticator (RFC 2866 §3): same digest with
//!   sixteen zero octets in place of the request authenticator.
//! - Message-Authenticator (RFC 3579 §3.2): HMAC-MD5 over the whole packet
//!   with the attribute value zeroed, keyed by the shared secret.

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::error::Error;

/// Length of every authenticator field and of the Message-Authenticator value.
pub const AUTHENTICATOR_LEN: usize = 16;

pub type Authenticator = [u8; AUTHENTICATOR_LEN];

type HmacMd5 = Hmac<Md5>;

/// MD5 over `packet ∥ secret`.
///
/// `packet` must already hold the seed (request authenticator, or zeros
/// for accounting requests) in its authenticator field.
pub fn packet_digest(packet: &[u8], secret: &[u8]) -> Authenticator {
    let mut hasher = Md5::new();
    hasher.update(packet);
    hasher.update(secret);
    let digest = hasher.finalize();

    let mut out = [0u8; AUTHENTICATOR_LEN];
    out.copy_from_slice(&digest);
    out
}

/// HMAC-MD5 over `packet`, which must have its Message-Authenticator value zeroed.
pub fn message_authenticator(packet: &[u8], secret: &[u8]) -> Result<Authenticator, Error> {
    let mut mac = HmacMd5::new_from_slice(secret).map_err(|_| Error::InvalidSecret)?;
    mac.update(packet);
    let tag = mac.finalize().into_bytes();

    let mut out = [0u8; AUTHENTICATOR_LEN];
    out.copy_from_slice(&tag);
    Ok(out)
}

/// Check a received Message-Authenticator value in constant time.
pub fn verify_message_authenticator(
    packet: &[u8],
    secret: &[u8],
    received: &[u8],
) -> Result<(), Error> {
    let mut mac = HmacMd5::new_from_slice(secret).map_err(|_| Error::InvalidSecret)?;
    mac.update(packet);
    mac.verify_slice(received)
        .map_err(|_| Error::MessageAuthenticatorMismatch)
}

/// Fresh random Request Authenticator for client-originated Access-Requests.
pub fn random_authenticator() -> Authenticator {
    let mut out = [0u8; AUTHENTICATOR_LEN];
    rand::thread_rng().fill_bytes(&mut out);
    out
}

/// Constant-time equality for authenticator comparison.
pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
