//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable exit code.

use std::net::SocketAddr;

use miette::Diagnostic;
use thiserror::Error;

use radvlan_config::ConfigError;
use radvlan_core::{CoreError, InvalidMac, StoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(radvlan::no_config),
        help(
            "Pass --config <file> or set RADVLAN_CONFIG.\n\
             Default location: {default}"
        )
    )]
    NoConfig { path: String, default: String },

    #[error("Configuration file already exists: {path}")]
    #[diagnostic(
        code(radvlan::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(radvlan::validation))]
    Validation { field: String, reason: String },

    #[error("No shared secret for {target}")]
    #[diagnostic(
        code(radvlan::no_secret),
        help(
            "Set the variable named by secret_env, store a keyring entry under \
             service 'radvlan', or put `secret` in the config file."
        )
    )]
    NoSecret { target: String },

    #[error("Could not load configuration: {message}")]
    #[diagnostic(code(radvlan::config))]
    Config { message: String },

    // ── Policy store ─────────────────────────────────────────────────

    #[error("Policy store unavailable at {target}")]
    #[diagnostic(
        code(radvlan::store_unavailable),
        help(
            "Check that the database is running and the credentials are right.\n\
             Reason: {reason}\n\
             Try: radvlan check-config --connect"
        )
    )]
    StoreUnavailable { target: String, reason: String },

    #[error("Policy store returned unusable data: {message}")]
    #[diagnostic(code(radvlan::store_integrity))]
    StoreIntegrity { message: String },

    // ── Network ──────────────────────────────────────────────────────

    #[error("Could not bind {addr}")]
    #[diagnostic(
        code(radvlan::bind),
        help("Another process may own the port, or binding it needs privileges.")
    )]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("No reply from {server} after {attempts} attempt(s)")]
    #[diagnostic(
        code(radvlan::timeout),
        help(
            "Check that the server is running and lists this host as a NAS client \
             with the same shared secret. Unknown clients are dropped silently."
        )
    )]
    ProbeTimeout { server: SocketAddr, attempts: u32 },

    #[error("Reply from {server} failed verification: {reason}")]
    #[diagnostic(
        code(radvlan::bad_reply),
        help("The shared secret passed with --secret probably differs from the server's.")
    )]
    BadReply { server: SocketAddr, reason: String },

    // ── Input ────────────────────────────────────────────────────────

    #[error("Invalid MAC address format: {raw}")]
    #[diagnostic(
        code(radvlan::invalid_mac),
        help("Expected 12 hex digits, e.g. AA:BB:CC:DD:EE:FF or aabb.ccdd.eeff")
    )]
    InvalidMac { raw: String },

    #[error("Internal error: {message}")]
    #[diagnostic(code(radvlan::internal))]
    Internal { message: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    #[diagnostic(code(radvlan::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. } => exit_code::NOT_FOUND,
            Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::Validation { .. } | Self::InvalidMac { .. } => exit_code::USAGE,
            Self::NoSecret { .. } | Self::BadReply { .. } => exit_code::AUTH,
            Self::StoreUnavailable { .. } => exit_code::CONNECTION,
            Self::Bind { source, .. }
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                exit_code::PERMISSION
            }
            Self::Bind { .. } => exit_code::CONNECTION,
            Self::ProbeTimeout { .. } => exit_code::TIMEOUT,
            Self::Config { .. }
            | Self::StoreIntegrity { .. }
            | Self::Internal { .. }
            | Self::Io(_)
            | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => Self::NoConfig {
                path: path.display().to_string(),
                default: radvlan_config::config_path().display().to_string(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoSecret { target } => Self::NoSecret { target },
            ConfigError::Io(source) => Self::Io(source),
            other @ (ConfigError::Figment(_) | ConfigError::Serialization(_)) => Self::Config {
                message: other.to_string(),
            },
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable { reason } => Self::StoreUnavailable {
                target: "policy store".into(),
                reason,
            },
            StoreError::Integrity { message } => Self::StoreIntegrity { message },
        }
    }
}

impl From<InvalidMac> for CliError {
    fn from(err: InvalidMac) -> Self {
        Self::InvalidMac {
            raw: err.raw().to_owned(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Bind { addr, source } => Self::Bind { addr, source },
            CoreError::InvalidMac(e) => e.into(),
            CoreError::Store(e) => e.into(),
            CoreError::Config { message } => Self::Config { message },
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_keep_their_category() {
        let err: CliError = ConfigError::Validation {
            field: "server.bind".into(),
            reason: "not an IP address".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::USAGE);

        let err: CliError = ConfigError::NoSecret {
            target: "clients.accept_any".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);

        let err: CliError = ConfigError::NotFound {
            path: "/nope.toml".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
    }

    #[test]
    fn bind_permission_denied_maps_to_permission() {
        let addr: SocketAddr = "0.0.0.0:1812".parse().unwrap();
        let err: CliError = CoreError::Bind {
            addr,
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::PERMISSION);

        let err: CliError = CoreError::Bind {
            addr,
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn store_unavailable_is_a_connection_failure() {
        let err: CliError = CoreError::Store(StoreError::Unavailable {
            reason: "refused".into(),
        })
        .into();
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
    }
}
