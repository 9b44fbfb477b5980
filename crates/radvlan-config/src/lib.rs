//! Configuration for the radvlan daemon and CLI.
//!
//! TOML file, environment overrides, secret resolution (env + keyring +
//! plaintext), and translation into the runtime types `radvlan-core`
//! consumes. Nothing here opens sockets or database connections.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use radvlan_core::{
    ClientRegistry, MacAddress, MacPrefix, MemoryStore, MySqlSettings, RetryPolicy, ServerConfig,
    VlanId,
};

/// Keyring service name for every stored secret.
pub const KEYRING_SERVICE: &str = "radvlan";

/// Prefix for structured environment overrides (`RADVLAN_STORE__HOST`).
pub const ENV_PREFIX: &str = "RADVLAN_";

/// Flat environment variables understood for drop-in compatibility with
/// existing deployments, and the config key each one sets.
const FLAT_ENV: &[(&str, &str)] = &[
    ("DB_HOST", "store.host"),
    ("DB_PORT", "store.port"),
    ("DB_NAME", "store.name"),
    ("DB_USER", "store.user"),
    ("LOG_FILE", "log.file"),
    ("LOG_LEVEL", "log.level"),
    ("AUTH_PORT", "server.auth_port"),
    ("ACCT_PORT", "server.acct_port"),
];

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no secret configured for {target}")]
    NoSecret { target: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub clients: ClientsSection,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub log: LogSection,

    /// Seed policy for the memory backend.
    #[serde(default)]
    pub policy: PolicySection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_auth_port")]
    pub auth_port: u16,

    #[serde(default = "default_acct_port")]
    pub acct_port: u16,

    /// Answer Accounting-Requests on `acct_port`.
    #[serde(default = "default_true")]
    pub accounting: bool,

    /// Deadline per policy-store lookup, in milliseconds.
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,

    #[serde(default = "default_audit_timeout_ms")]
    pub audit_timeout_ms: u64,

    /// Retransmission window in milliseconds. 0 disables duplicate detection.
    #[serde(default = "default_dedup_window_ms")]
    pub dedup_window_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            auth_port: default_auth_port(),
            acct_port: default_acct_port(),
            accounting: true,
            lookup_timeout_ms: default_lookup_timeout_ms(),
            audit_timeout_ms: default_audit_timeout_ms(),
            dedup_window_ms: default_dedup_window_ms(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_auth_port() -> u16 {
    1812
}
fn default_acct_port() -> u16 {
    1813
}
fn default_true() -> bool {
    true
}
fn default_lookup_timeout_ms() -> u64 {
    2000
}
fn default_audit_timeout_ms() -> u64 {
    5000
}
fn default_dedup_window_ms() -> u64 {
    5000
}

/// RADIUS clients (NAS devices) and their shared secrets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientsSection {
    /// Accept any source address with the wildcard secret. Lab use only.
    #[serde(default)]
    pub accept_any: bool,

    /// Wildcard secret (plaintext, prefer `secret_env` or the keyring).
    pub secret: Option<String>,

    /// Environment variable holding the wildcard secret.
    #[serde(default = "default_secret_env")]
    pub secret_env: Option<String>,

    #[serde(default)]
    pub nas: Vec<NasEntry>,
}

impl Default for ClientsSection {
    fn default() -> Self {
        Self {
            accept_any: false,
            secret: None,
            secret_env: default_secret_env(),
            nas: Vec::new(),
        }
    }
}

fn default_secret_env() -> Option<String> {
    Some("RADIUS_SECRET".into())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NasEntry {
    pub name: String,

    /// Source IP address of the NAS.
    pub address: String,

    /// Shared secret (plaintext, prefer `secret_env` or the keyring).
    pub secret: Option<String>,

    /// Environment variable holding this NAS's secret.
    pub secret_env: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Mysql,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoreSection {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_db_host")]
    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default = "default_db_name")]
    pub name: String,

    #[serde(default = "default_db_user")]
    pub user: String,

    /// Database password (plaintext, prefer `password_env` or the keyring).
    pub password: Option<String>,

    #[serde(default = "default_password_env")]
    pub password_env: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// Connection attempts at startup before giving up.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Initial delay between attempts; doubles up to 30s.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            host: default_db_host(),
            port: default_db_port(),
            name: default_db_name(),
            user: default_db_user(),
            password: None,
            password_env: default_password_env(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            connect_attempts: default_connect_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_db_host() -> String {
    "localhost".into()
}
fn default_db_port() -> u16 {
    3306
}
fn default_db_name() -> String {
    "radius".into()
}
fn default_db_user() -> String {
    "radius".into()
}
fn default_password_env() -> Option<String> {
    Some("DB_PASS".into())
}
fn default_max_connections() -> u32 {
    10
}
fn default_acquire_timeout_ms() -> u64 {
    2000
}
fn default_connect_attempts() -> u32 {
    5
}
fn default_retry_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogSection {
    /// `tracing` filter directive used when neither `-v` nor `RUST_LOG` is set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write logs to this file.
    pub file: Option<PathBuf>,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PolicySection {
    #[serde(default)]
    pub exact: Vec<ExactSeed>,

    #[serde(default)]
    pub prefixes: Vec<PrefixSeed>,

    pub default: Option<DefaultSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExactSeed {
    pub mac: String,
    pub vlan: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PrefixSeed {
    pub prefix: String,
    pub vlan: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DefaultSeed {
    pub vlan: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "radvlan", "radvlan").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("radvlan");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load config from defaults, the TOML file, and the environment.
///
/// An explicit `path` must exist; the platform default path is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) if !p.exists() => {
            return Err(ConfigError::NotFound {
                path: p.to_path_buf(),
            });
        }
        Some(p) => p.to_path_buf(),
        None => config_path(),
    };

    let config: Config = figment(&path).extract()?;
    Ok(config)
}

/// The provider stack, lowest precedence first.
fn figment(path: &Path) -> Figment {
    let flat_keys: Vec<&str> = FLAT_ENV.iter().map(|(env, _)| *env).collect();
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(
            Env::raw()
                .only(&flat_keys)
                .map(|key| flat_env_key(key.as_str()).into()),
        )
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

fn flat_env_key(key: &str) -> String {
    FLAT_ENV
        .iter()
        .find(|(env, _)| key.eq_ignore_ascii_case(env))
        .map_or_else(|| key.to_owned(), |(_, path)| (*path).to_owned())
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Secret resolution ───────────────────────────────────────────────

/// Resolve a secret: env var named by `env_name` → system keyring entry
/// `keyring_user` → plaintext from the config file.
pub fn resolve_secret(
    env_name: Option<&str>,
    keyring_user: &str,
    plaintext: Option<&str>,
) -> Option<SecretString> {
    // 1. Env var
    if let Some(name) = env_name {
        if let Ok(val) = std::env::var(name) {
            if !val.is_empty() {
                return Some(SecretString::from(val));
            }
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, keyring_user) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    plaintext
        .filter(|s| !s.is_empty())
        .map(|s| SecretString::from(s.to_owned()))
}

/// Database password. An empty password is allowed only if nothing is configured.
pub fn resolve_db_password(store: &StoreSection) -> SecretString {
    resolve_secret(
        store.password_env.as_deref(),
        "store/password",
        store.password.as_deref(),
    )
    .unwrap_or_else(|| SecretString::from(String::new()))
}

// ── Translation to runtime types ────────────────────────────────────

impl Config {
    /// Check everything that can be checked without secrets or network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server_config()?;
        for nas in &self.clients.nas {
            parse_ip(&format!("clients.nas[{}].address", nas.name), &nas.address)?;
        }
        if !self.clients.accept_any && self.clients.nas.is_empty() {
            return Err(invalid(
                "clients",
                "no NAS clients configured and accept_any is off; every request would be dropped",
            ));
        }
        if self.store.backend == StoreBackend::Mysql {
            if self.store.host.trim().is_empty() {
                return Err(invalid("store.host", "must not be empty"));
            }
            if self.store.connect_attempts == 0 {
                return Err(invalid("store.connect_attempts", "must be at least 1"));
            }
        }
        self.seed_memory_store(&MemoryStore::new())?;
        Ok(())
    }

    pub fn server_config(&self) -> Result<ServerConfig, ConfigError> {
        let s = &self.server;
        let bind = parse_ip("server.bind", &s.bind)?;
        if s.accounting && s.acct_port != 0 && s.acct_port == s.auth_port {
            return Err(invalid(
                "server.acct_port",
                format!("must differ from auth_port ({})", s.auth_port),
            ));
        }
        if s.lookup_timeout_ms == 0 {
            return Err(invalid("server.lookup_timeout_ms", "must be greater than 0"));
        }
        if s.audit_timeout_ms == 0 {
            return Err(invalid("server.audit_timeout_ms", "must be greater than 0"));
        }

        Ok(ServerConfig {
            bind,
            auth_port: s.auth_port,
            acct_port: s.accounting.then_some(s.acct_port),
            lookup_timeout: Duration::from_millis(s.lookup_timeout_ms),
            audit_timeout: Duration::from_millis(s.audit_timeout_ms),
            dedup_window: Duration::from_millis(s.dedup_window_ms),
        })
    }

    /// Build the client registry, resolving every secret.
    pub fn client_registry(&self) -> Result<ClientRegistry, ConfigError> {
        let mut registry = ClientRegistry::new();
        for nas in &self.clients.nas {
            let field = format!("clients.nas[{}]", nas.name);
            let address = parse_ip(&format!("{field}.address"), &nas.address)?;
            let secret = resolve_secret(
                nas.secret_env.as_deref(),
                &format!("clients/{}/secret", nas.name),
                nas.secret.as_deref(),
            )
            .ok_or(ConfigError::NoSecret { target: field })?;
            registry.insert(address, nas.name.clone(), secret);
        }

        if self.clients.accept_any {
            let secret = resolve_secret(
                self.clients.secret_env.as_deref(),
                "clients/accept-any",
                self.clients.secret.as_deref(),
            )
            .ok_or_else(|| ConfigError::NoSecret {
                target: "clients.accept_any".into(),
            })?;
            registry = registry.with_accept_any(secret);
        }
        Ok(registry)
    }

    pub fn mysql_settings(&self) -> MySqlSettings {
        let s = &self.store;
        MySqlSettings {
            host: s.host.clone(),
            port: s.port,
            database: s.name.clone(),
            username: s.user.clone(),
            password: resolve_db_password(s),
            max_connections: s.max_connections,
            acquire_timeout: Duration::from_millis(s.acquire_timeout_ms),
            retry: RetryPolicy {
                initial_delay: Duration::from_millis(s.retry_delay_ms),
                max_attempts: s.connect_attempts,
                ..RetryPolicy::default()
            },
        }
    }

    /// Load `[policy]` into a memory store, validating MACs and VLANs.
    pub fn seed_memory_store(&self, store: &MemoryStore) -> Result<(), ConfigError> {
        for (i, seed) in self.policy.exact.iter().enumerate() {
            let field = format!("policy.exact[{i}]");
            let mac = MacAddress::normalize(&seed.mac)
                .map_err(|e| invalid(format!("{field}.mac"), e.to_string()))?;
            check_vlan(&field, seed.vlan)?;
            store.insert_exact(mac, seed.vlan);
        }
        for (i, seed) in self.policy.prefixes.iter().enumerate() {
            let field = format!("policy.prefixes[{i}]");
            let prefix = MacPrefix::normalize(&seed.prefix)
                .map_err(|e| invalid(format!("{field}.prefix"), e.to_string()))?;
            check_vlan(&field, seed.vlan)?;
            store.insert_prefix(prefix, seed.vlan);
        }
        if let Some(default) = &self.policy.default {
            if default.enabled {
                check_vlan("policy.default", default.vlan)?;
            }
            store.set_default(default.vlan, default.enabled);
        }
        Ok(())
    }
}

fn parse_ip(field: &str, raw: &str) -> Result<IpAddr, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(field, format!("not an IP address: {raw:?}")))
}

fn check_vlan(field: &str, vlan: i64) -> Result<(), ConfigError> {
    VlanId::try_from(vlan)
        .map(|_| ())
        .map_err(|e| invalid(format!("{field}.vlan"), e.to_string()))
}
