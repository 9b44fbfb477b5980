// ── Tiered VLAN resolution ──
//
// exact MAC -> vendor prefix -> enabled default -> reject.
//
// The first tier that yields a row decides, even if its VLAN is invalid:
// a bad row downgrades to a reject instead of falling through to a
// broader tier. Every store failure fails closed.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{InvalidVlan, StoreError};
use crate::model::{MacAddress, Outcome, RejectReason, VlanId};
use crate::store::PolicyStore;

/// Why a lookup chain stopped early.
#[derive(Debug)]
enum LookupFailure {
    Timeout { tier: &'static str },
    Store { tier: &'static str, error: StoreError },
    Integrity { tier: &'static str, error: InvalidVlan },
}

impl LookupFailure {
    fn reason(&self) -> RejectReason {
        match self {
            Self::Timeout { .. } => RejectReason::StoreTimeout,
            Self::Store {
                error: StoreError::Unavailable { .. },
                ..
            } => RejectReason::StoreUnavailable,
            Self::Store {
                error: StoreError::Integrity { .. },
                ..
            }
            | Self::Integrity { .. } => RejectReason::StoreIntegrity,
        }
    }
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { tier } => write!(f, "{tier} lookup timed out"),
            Self::Store { tier, error } => write!(f, "{tier} lookup failed: {error}"),
            Self::Integrity { tier, error } => write!(f, "{tier} lookup failed: {error}"),
        }
    }
}

/// Resolves MACs to VLAN outcomes against a [`PolicyStore`].
#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn PolicyStore>,
    lookup_timeout: Duration,
}

impl Resolver {
    pub fn new(store: Arc<dyn PolicyStore>, lookup_timeout: Duration) -> Self {
        Self {
            store,
            lookup_timeout,
        }
    }

    /// Resolve a raw MAC candidate as extracted from a request.
    ///
    /// Missing or malformed input rejects without touching the store.
    pub async fn resolve_raw(&self, raw: Option<&str>) -> Outcome {
        let Some(raw) = raw else {
            return Outcome::reject(RejectReason::MissingMac);
        };
        match MacAddress::normalize(raw) {
            Ok(mac) => self.resolve(&mac).await,
            Err(err) => {
                debug!(error = %err, "MAC candidate did not normalize");
                Outcome::reject(RejectReason::InvalidMac {
                    raw: err.raw().to_owned(),
                })
            }
        }
    }

    /// Resolve a canonical MAC. Never fails: store trouble becomes a reject.
    pub async fn resolve(&self, mac: &MacAddress) -> Outcome {
        match self.lookup_chain(mac).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                warn!(%mac, %failure, "policy lookup failed, rejecting");
                Outcome::reject(failure.reason())
            }
        }
    }

    async fn lookup_chain(&self, mac: &MacAddress) -> Result<Outcome, LookupFailure> {
        if let Some(raw) = self.bounded("exact", self.store.exact_vlan(mac)).await? {
            let vlan = validate("exact", raw)?;
            return Ok(Outcome::Exact {
                vlan,
                mac: mac.clone(),
            });
        }

        let prefix = mac.prefix();
        if let Some(raw) = self.bounded("prefix", self.store.prefix_vlan(&prefix)).await? {
            let vlan = validate("prefix", raw)?;
            return Ok(Outcome::Prefix { vlan, prefix });
        }

        match self.bounded("default", self.store.default_policy()).await? {
            Some(policy) if policy.enabled => {
                let vlan = validate("default", policy.vlan)?;
                Ok(Outcome::Default { vlan })
            }
            Some(_) => {
                debug!(%mac, "default VLAN policy is disabled");
                Ok(Outcome::reject(RejectReason::NoAssignment))
            }
            None => Ok(Outcome::reject(RejectReason::NoAssignment)),
        }
    }

    async fn bounded<T>(
        &self,
        tier: &'static str,
        lookup: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, LookupFailure> {
        match tokio::time::timeout(self.lookup_timeout, lookup).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(LookupFailure::Store { tier, error }),
            Err(_) => Err(LookupFailure::Timeout { tier }),
        }
    }
}

fn validate(tier: &'static str, raw: i64) -> Result<VlanId, LookupFailure> {
    VlanId::try_from(raw).map_err(|error| LookupFailure::Integrity { tier, error })
}
