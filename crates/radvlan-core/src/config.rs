// ── Runtime server configuration ──
//
// Listener addresses and engine timing. Built by the binary from the
// layered config file; core never reads files or environment itself.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Configuration for one server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address both listeners bind to.
    pub bind: IpAddr,
    /// Authentication port (1812). 0 picks an ephemeral port.
    pub auth_port: u16,
    /// Accounting port (1813). `None` disables the accounting listener.
    pub acct_port: Option<u16>,
    /// Deadline for each individual policy-store lookup.
    pub lookup_timeout: Duration,
    /// Deadline for one audit append.
    pub audit_timeout: Duration,
    /// How long a completed reply stays replayable for retransmissions.
    /// Zero disables duplicate detection.
    pub dedup_window: Duration,
}

impl ServerConfig {
    pub fn auth_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.auth_port)
    }

    pub fn acct_addr(&self) -> Option<SocketAddr> {
        self.acct_port.map(|port| SocketAddr::new(self.bind, port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            auth_port: 1812,
            acct_port: Some(1813),
            lookup_timeout: Duration::from_secs(2),
            audit_timeout: Duration::from_secs(5),
            dedup_window: Duration::from_secs(5),
        }
    }
}

// ── Retry / backoff ──────────────────────────────────────────────────

/// Exponential backoff for startup connection attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the second attempt. Default: 1s.
    pub initial_delay: Duration,
    /// Upper bound on a single delay. Default: 30s.
    pub max_delay: Duration,
    /// Total attempts, including the first. Default: 5.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX).min(30);
        let base = self.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        // Deterministic jitter keyed on the attempt number.
        let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
        Duration::from_secs_f64((capped * jitter_factor).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_standard_ports() {
        let config = ServerConfig::default();
        assert_eq!(config.auth_addr().port(), 1812);
        assert_eq!(config.acct_addr().map(|a| a.port()), Some(1813));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        let first = policy.backoff(0);
        let third = policy.backoff(2);
        assert!(first <= Duration::from_millis(1250));
        assert!(third > first);
        // 30s cap plus at most 25% jitter.
        assert!(policy.backoff(20) <= Duration::from_millis(37_500));
    }
}
