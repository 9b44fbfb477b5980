// ── MySQL policy store ──
//
// Reads the FreeRADIUS-style tables the management UI maintains:
//
//   radreply             exact MAC -> Tunnel-Private-Group-ID (text)
//   mac_prefixes         OUI prefix -> vlan_id
//   default_vlan_config  newest row by id wins
//   radius_logs          audit trail
//
// Integer columns are cast to SIGNED in SQL so INT, BIGINT and UNSIGNED
// schemas all decode into i64.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::MySqlPool;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use tracing::{debug, info, warn};

use super::{AuditSink, DefaultPolicy, PolicyStore};
use crate::config::RetryPolicy;
use crate::error::StoreError;
use crate::model::{AuditRecord, MacAddress, MacPrefix};

/// Reply attribute the exact-match table stores VLANs under.
const VLAN_ATTRIBUTE: &str = "Tunnel-Private-Group-ID";

const EXACT_SQL: &str = "SELECT value FROM radreply \
     WHERE username = ? AND attribute = ? LIMIT 1";

const PREFIX_SQL: &str = "SELECT CAST(vlan_id AS SIGNED) FROM mac_prefixes \
     WHERE prefix = ? LIMIT 1";

const DEFAULT_SQL: &str = "SELECT CAST(vlan_id AS SIGNED), CAST(enabled AS SIGNED) \
     FROM default_vlan_config ORDER BY id DESC LIMIT 1";

const AUDIT_SQL: &str = "INSERT INTO radius_logs \
     (username, nas_ip_address, nas_port_id, called_station_id, calling_station_id, \
      request_type, response_type, reason) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

/// Connection settings for [`MySqlStore::connect`].
#[derive(Debug, Clone)]
pub struct MySqlSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: SecretString,
    pub max_connections: u32,
    /// Deadline for acquiring a pooled connection.
    pub acquire_timeout: Duration,
    pub retry: RetryPolicy,
}

impl MySqlSettings {
    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(self.password.expose_secret())
            .database(&self.database)
            .charset("utf8mb4")
    }

    /// `host:port/database`, for log lines.
    pub fn display_target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

/// Policy store and audit sink backed by a MySQL connection pool.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Open a pool, retrying with backoff until the server answers or
    /// `settings.retry.max_attempts` is exhausted.
    pub async fn connect(settings: &MySqlSettings) -> Result<Self, StoreError> {
        let target = settings.display_target();
        let attempts = settings.retry.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            let result = MySqlPoolOptions::new()
                .max_connections(settings.max_connections.max(1))
                .acquire_timeout(settings.acquire_timeout)
                .connect_with(settings.connect_options())
                .await;

            match result {
                Ok(pool) => {
                    info!(%target, attempt = attempt + 1, "connected to policy store");
                    return Ok(Self { pool });
                }
                Err(e) => {
                    let err = StoreError::from(e);
                    if attempt + 1 < attempts {
                        let delay = settings.retry.backoff(attempt);
                        warn!(
                            %target,
                            attempt = attempt + 1,
                            error = %err,
                            delay_ms = delay.as_millis(),
                            "policy store not reachable, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| StoreError::Unavailable {
            reason: format!("no connection attempt made to {target}"),
        }))
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl PolicyStore for MySqlStore {
    async fn exact_vlan(&self, mac: &MacAddress) -> Result<Option<i64>, StoreError> {
        let value: Option<String> = sqlx::query_scalar(EXACT_SQL)
            .bind(mac.as_str())
            .bind(VLAN_ATTRIBUTE)
            .fetch_optional(&self.pool)
            .await?;

        value
            .map(|v| {
                v.trim().parse::<i64>().map_err(|_| StoreError::Integrity {
                    message: format!("radreply value {v:?} for {mac} is not a number"),
                })
            })
            .transpose()
    }

    async fn prefix_vlan(&self, prefix: &MacPrefix) -> Result<Option<i64>, StoreError> {
        let vlan: Option<i64> = sqlx::query_scalar(PREFIX_SQL)
            .bind(prefix.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(vlan)
    }

    async fn default_policy(&self) -> Result<Option<DefaultPolicy>, StoreError> {
        let row: Option<(i64, i64)> = sqlx::query_as(DEFAULT_SQL)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(vlan, enabled)| DefaultPolicy {
            vlan,
            enabled: enabled != 0,
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for MySqlStore {
    async fn append_audit(&self, record: &AuditRecord) -> Result<(), StoreError> {
        sqlx::query(AUDIT_SQL)
            .bind(&record.username)
            .bind(&record.nas_ip_address)
            .bind(&record.nas_port_id)
            .bind(&record.called_station_id)
            .bind(&record.calling_station_id)
            .bind(&record.request_type)
            .bind(&record.response_type)
            .bind(&record.reason)
            .execute(&self.pool)
            .await?;
        debug!(username = %record.username, "audit row written");
        Ok(())
    }
}

// ── Conversion from driver errors ────────────────────────────────────

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::TypeNotFound { .. } => Self::Integrity {
                message: err.to_string(),
            },
            other => Self::Unavailable {
                reason: other.to_string(),
            },
        }
    }
}
