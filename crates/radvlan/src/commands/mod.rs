//! Command handlers.

pub mod check;
pub mod init;
pub mod normalize;
pub mod probe;
pub mod resolve;
pub mod serve;

use std::sync::Arc;

use radvlan_config::{Config, StoreBackend};
use radvlan_core::{AuditSink, MemoryStore, MySqlStore, PolicyStore};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Route a parsed command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::InitConfig(args) => init::handle(&args, global),
        Command::CheckConfig(args) => check::handle(&args, global).await,
        Command::Normalize(args) => normalize::handle(&args, global),
        Command::Resolve(args) => resolve::handle(&args, global).await,
        Command::Probe(args) => probe::handle(&args, global).await,
        Command::Serve(_) | Command::Completions(_) => unreachable!(),
    }
}

/// Load the layered configuration named by `--config`, or the default path.
pub(crate) fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(radvlan_config::load_config(global.config.as_deref())?)
}

// ── Store backends ───────────────────────────────────────────────────

/// The opened policy store, whichever backend the config selects.
pub(crate) enum Backend {
    Memory(Arc<MemoryStore>),
    MySql(Arc<MySqlStore>),
}

impl Backend {
    /// Open the configured backend. `force_memory` overrides `store.backend`.
    pub async fn open(config: &Config, force_memory: bool) -> Result<Self, CliError> {
        if force_memory || config.store.backend == StoreBackend::Memory {
            let store = Arc::new(MemoryStore::new());
            config.seed_memory_store(&store)?;
            return Ok(Self::Memory(store));
        }

        let settings = config.mysql_settings();
        let store = MySqlStore::connect(&settings)
            .await
            .map_err(|e| CliError::StoreUnavailable {
                target: settings.display_target(),
                reason: e.to_string(),
            })?;
        Ok(Self::MySql(Arc::new(store)))
    }

    pub fn policy(&self) -> Arc<dyn PolicyStore> {
        let store: Arc<dyn PolicyStore> = match self {
            Self::Memory(store) => store.clone(),
            Self::MySql(store) => store.clone(),
        };
        store
    }

    pub fn audit(&self) -> Arc<dyn AuditSink> {
        let sink: Arc<dyn AuditSink> = match self {
            Self::Memory(store) => store.clone(),
            Self::MySql(store) => store.clone(),
        };
        sink
    }

    pub fn describe(&self, config: &Config) -> String {
        match self {
            Self::Memory(_) => format!(
                "memory ({} exact, {} prefix)",
                config.policy.exact.len(),
                config.policy.prefixes.len()
            ),
            Self::MySql(_) => format!(
                "mysql {}:{}/{}",
                config.store.host, config.store.port, config.store.name
            ),
        }
    }

    pub async fn close(&self) {
        if let Self::MySql(store) = self {
            store.close().await;
        }
    }
}
