// ── NAS client registry ──
//
// Maps datagram source addresses to shared secrets. Unknown sources are
// dropped unless the operator explicitly turned on accept-any mode, which
// applies one secret to every address. Explicit entries always win.

use std::collections::HashMap;
use std::net::IpAddr;

use secrecy::SecretString;
use tracing::warn;

use crate::error::CoreError;

/// A configured NAS.
#[derive(Debug, Clone)]
pub struct NasClient {
    pub name: String,
    pub secret: SecretString,
}

/// Secret resolved for one source address, and how it was found.
#[derive(Debug, Clone, Copy)]
pub struct ClientMatch<'a> {
    pub name: &'a str,
    pub secret: &'a SecretString,
    /// `true` when no explicit entry matched and accept-any supplied the secret.
    pub via_accept_any: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<IpAddr, NasClient>,
    accept_any: Option<SecretString>,
}

const ACCEPT_ANY_NAME: &str = "accept-any";

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a NAS. A later entry for the same address replaces the earlier one.
    pub fn insert(&mut self, address: IpAddr, name: impl Into<String>, secret: SecretString) {
        self.clients.insert(
            address.to_canonical(),
            NasClient {
                name: name.into(),
                secret,
            },
        );
    }

    pub fn with_client(
        mut self,
        address: IpAddr,
        name: impl Into<String>,
        secret: SecretString,
    ) -> Self {
        self.insert(address, name, secret);
        self
    }

    /// Accept requests from any source using `secret`.
    ///
    /// Lab deployments only: it defeats the source check
    /// that stops arbitrary hosts from probing policy.
    pub fn with_accept_any(mut self, secret: SecretString) -> Self {
        warn!("accept-any client mode enabled: every source address shares one secret");
        self.accept_any = Some(secret);
        self
    }

    pub fn accepts_any(&self) -> bool {
        self.accept_any.is_some()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty() && self.accept_any.is_none()
    }

    /// Explicitly configured NAS entries, in no particular order.
    pub fn clients(&self) -> impl Iterator<Item = (&IpAddr, &NasClient)> {
        self.clients.iter()
    }

    /// Resolve the secret for a datagram source.
    pub fn lookup(&self, source: IpAddr) -> Result<ClientMatch<'_>, CoreError> {
        let address = source.to_canonical();
        if let Some(client) = self.clients.get(&address) {
            return Ok(ClientMatch {
                name: &client.name,
                secret: &client.secret,
                via_accept_any: false,
            });
        }
        match &self.accept_any {
            Some(secret) => Ok(ClientMatch {
                name: ACCEPT_ANY_NAME,
                secret,
                via_accept_any: true,
            }),
            None => Err(CoreError::UnknownClient { address }),
        }
    }

    pub fn secret_for(&self, source: IpAddr) -> Result<&SecretString, CoreError> {
        self.lookup(source).map(|m| m.secret)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::net::Ipv6Addr;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn unknown_source_is_rejected_by_default() {
        let registry = ClientRegistry::new().with_client(ip("10.0.0.2"), "ap-1", secret("s1"));
        assert!(matches!(
            registry.lookup(ip("10.0.0.3")),
            Err(CoreError::UnknownClient { .. })
        ));
    }

    #[test]
    fn explicit_entry_wins_over_accept_any() {
        let registry = ClientRegistry::new()
            .with_client(ip("10.0.0.2"), "ap-1", secret("s1"))
            .with_accept_any(secret("shared"));

        let known = registry.lookup(ip("10.0.0.2")).unwrap();
        assert_eq!(known.name, "ap-1");
        assert_eq!(known.secret.expose_secret(), "s1");
        assert!(!known.via_accept_any);

        let other = registry.lookup(ip("192.0.2.50")).unwrap();
        assert_eq!(other.secret.expose_secret(), "shared");
        assert!(other.via_accept_any);
    }

    #[test]
    fn v4_mapped_sources_match_v4_entries() {
        let registry = ClientRegistry::new().with_client(ip("10.0.0.2"), "ap-1", secret("s1"));
        let mapped = IpAddr::V6(Ipv6Addr::new(0, 0, 0, 0, 0, 0xffff, 0x0a00, 0x0002));
        assert_eq!(registry.secret_for(mapped).unwrap().expose_secret(), "s1");
    }

    #[test]
    fn emptiness_counts_accept_any() {
        assert!(ClientRegistry::new().is_empty());
        assert!(!ClientRegistry::new().with_accept_any(secret("x")).is_empty());
    }
}
