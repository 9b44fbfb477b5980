// ── MAC identity types ──
//
// Every policy lookup is keyed on the canonical form produced here:
// twelve lowercase hex digits grouped in colon-separated pairs. NAS
// vendors disagree on delimiters and case, so normalization strips
// everything that is not a hex digit and then counts what is left.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InvalidMac;

const MAC_DIGITS: usize = 12;
const PREFIX_DIGITS: usize = 6;

// ── MacAddress ──────────────────────────────────────────────────────

/// MAC address in canonical form (`aa:bb:cc:dd:ee:ff`).
///
/// Only constructible through [`normalize`](Self::normalize), so holding a
/// `MacAddress` proves the value is canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Canonicalize any delimiter/case variant of a MAC address.
    ///
    /// `AA-BB-CC-DD-EE-FF`, `aabb.ccdd.eeff` and `AABBCCDDEEFF` all yield
    /// `aa:bb:cc:dd:ee:ff`. Fails unless exactly twelve hex digits remain.
    pub fn normalize(raw: &str) -> Result<Self, InvalidMac> {
        canonical_hex(raw, MAC_DIGITS)
            .map(Self)
            .ok_or_else(|| InvalidMac::new(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Organizationally unique identifier: the first three octets.
    pub fn prefix(&self) -> MacPrefix {
        MacPrefix(self.0[..8].to_owned())
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = InvalidMac;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = InvalidMac;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::normalize(&value)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

// ── MacPrefix ───────────────────────────────────────────────────────

/// First three octets of a MAC address in canonical form (`aa:bb:cc`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacPrefix(String);

impl MacPrefix {
    /// Canonicalize a vendor prefix written in any delimiter/case style.
    pub fn normalize(raw: &str) -> Result<Self, InvalidMac> {
        canonical_hex(raw, PREFIX_DIGITS)
            .map(Self)
            .ok_or_else(|| InvalidMac::new(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacPrefix {
    type Err = InvalidMac;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl TryFrom<String> for MacPrefix {
    type Error = InvalidMac;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::normalize(&value)
    }
}

impl From<MacPrefix> for String {
    fn from(prefix: MacPrefix) -> Self {
        prefix.0
    }
}

/// Keep hex digits only, lowercase them, and regroup into colon pairs.
/// `None` unless exactly `digits` hex digits were present.
fn canonical_hex(raw: &str, digits: usize) -> Option<String> {
    let hex: Vec<char> = raw
        .chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if hex.len() != digits {
        return None;
    }

    let mut out = String::with_capacity(digits + digits / 2);
    for (i, pair) in hex.chunks(2).enumerate() {
        if i > 0 {
            out.push(':');
        }
        out.extend(pair);
    }
    Some(out)
}
