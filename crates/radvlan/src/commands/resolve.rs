//! `radvlan resolve`: run the tiered lookup for one MAC, no RADIUS involved.
//!
//! Nothing is written to the audit trail.

use serde::Serialize;

use radvlan_core::{MacAddress, Outcome, RejectReason, Resolver};

use crate::cli::{GlobalOpts, ResolveArgs};
use crate::commands::Backend;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct Resolution {
    input: String,
    mac: MacAddress,
    outcome: Outcome,
}

pub async fn handle(args: &ResolveArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mac = MacAddress::normalize(&args.mac)?;
    let config = super::load(global)?;
    let server = config.server_config()?;

    let backend = Backend::open(&config, args.memory).await?;
    let resolver = Resolver::new(backend.policy(), server.lookup_timeout);
    let outcome = resolver.resolve(&mac).await;
    backend.close().await;

    let resolution = Resolution {
        input: args.mac.clone(),
        mac,
        outcome,
    };
    let out = output::render(global.output, &resolution, |r| {
        format!("{} {}", r.mac, r.outcome)
    })?;
    output::print_output(&out, global.quiet)?;

    store_failure(&resolution.outcome, &backend.describe(&config)).map_or(Ok(()), Err)
}

/// A reject caused by the store, rather than by policy, is a command failure.
fn store_failure(outcome: &Outcome, target: &str) -> Option<CliError> {
    match outcome.reject_reason()? {
        RejectReason::StoreUnavailable | RejectReason::StoreTimeout => {
            Some(CliError::StoreUnavailable {
                target: target.to_owned(),
                reason: outcome.to_string(),
            })
        }
        RejectReason::StoreIntegrity => Some(CliError::StoreIntegrity {
            message: outcome.to_string(),
        }),
        RejectReason::MissingMac
        | RejectReason::InvalidMac { .. }
        | RejectReason::NoAssignment => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use radvlan_core::VlanId;

    use crate::error::exit_code;

    #[test]
    fn policy_rejects_are_not_failures() {
        let outcome = Outcome::reject(RejectReason::NoAssignment);
        assert!(store_failure(&outcome, "memory").is_none());

        let accept = Outcome::Default {
            vlan: VlanId::new(99).unwrap(),
        };
        assert!(store_failure(&accept, "memory").is_none());
    }

    #[test]
    fn store_rejects_map_to_store_errors() {
        let err = store_failure(&Outcome::reject(RejectReason::StoreTimeout), "db:3306/radius")
            .unwrap();
        assert_eq!(err.exit_code(), exit_code::CONNECTION);

        let err = store_failure(&Outcome::reject(RejectReason::StoreIntegrity), "db").unwrap();
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }
}
