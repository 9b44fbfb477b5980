// ── Policy outcomes ──
//
// A resolution is exactly one of four tiers. Accept tiers always carry a
// validated VLAN; a reject always carries why.

use serde::Serialize;
use std::fmt;
use strum::Display;

use crate::model::{MacAddress, MacPrefix, VlanId};

/// Marker recorded as the matched key for default-tier accepts.
pub const DEFAULT_KEY: &str = "DEFAULT";

/// Which tier produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Prefix,
    Default,
    Reject,
}

/// Why a request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectReason {
    /// Neither Calling-Station-Id nor User-Name was present.
    MissingMac,
    /// The candidate MAC did not normalize.
    InvalidMac { raw: String },
    /// No exact, prefix, or enabled default policy.
    NoAssignment,
    /// The policy store could not be reached.
    StoreUnavailable,
    /// A policy lookup exceeded its deadline.
    StoreTimeout,
    /// The policy store returned a VLAN outside `1..=4094` or unparseable data.
    StoreIntegrity,
}

impl RejectReason {
    /// Rejects caused by infrastructure rather than policy.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable | Self::StoreTimeout | Self::StoreIntegrity
        )
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMac => f.write_str("No MAC address found in request"),
            Self::InvalidMac { raw } => write!(f, "Invalid MAC address format: {raw}"),
            Self::NoAssignment => f.write_str("No VLAN assignment found"),
            Self::StoreUnavailable => f.write_str("Policy store unavailable"),
            Self::StoreTimeout => f.write_str("Policy store lookup timed out"),
            Self::StoreIntegrity => f.write_str("Policy store returned an invalid VLAN"),
        }
    }
}

/// Result of resolving one MAC against the policy store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Outcome {
    Exact { vlan: VlanId, mac: MacAddress },
    Prefix { vlan: VlanId, prefix: MacPrefix },
    Default { vlan: VlanId },
    Reject { reason: RejectReason },
}

impl Outcome {
    pub fn reject(reason: RejectReason) -> Self {
        Self::Reject { reason }
    }

    pub fn kind(&self) -> MatchKind {
        match self {
            Self::Exact { .. } => MatchKind::Exact,
            Self::Prefix { .. } => MatchKind::Prefix,
            Self::Default { .. } => MatchKind::Default,
            Self::Reject { .. } => MatchKind::Reject,
        }
    }

    /// Assigned VLAN; `None` exactly when the outcome is a reject.
    pub fn vlan(&self) -> Option<VlanId> {
        match self {
            Self::Exact { vlan, .. } | Self::Prefix { vlan, .. } | Self::Default { vlan } => {
                Some(*vlan)
            }
            Self::Reject { .. } => None,
        }
    }

    /// Policy key that matched: the MAC, the prefix, or [`DEFAULT_KEY`].
    pub fn matched_key(&self) -> Option<&str> {
        match self {
            Self::Exact { mac, .. } => Some(mac.as_str()),
            Self::Prefix { prefix, .. } => Some(prefix.as_str()),
            Self::Default { .. } => Some(DEFAULT_KEY),
            Self::Reject { .. } => None,
        }
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            Self::Reject { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn is_accept(&self) -> bool {
        !matches!(self, Self::Reject { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact { vlan, mac } => write!(f, "exact vlan={vlan} key={mac}"),
            Self::Prefix { vlan, prefix } => write!(f, "prefix vlan={vlan} key={prefix}"),
            Self::Default { vlan } => write!(f, "default vlan={vlan} key={DEFAULT_KEY}"),
            Self::Reject { reason } => write!(f, "reject: {reason}"),
        }
    }
}
