//! `radvlan serve`: run the listeners until SIGINT or SIGTERM.

use tracing::{info, warn};

use radvlan_config::{Config, StoreBackend};
use radvlan_core::Server;

use crate::cli::{GlobalOpts, ServeArgs};
use crate::commands::Backend;
use crate::error::CliError;
use crate::logging;

pub async fn handle(args: ServeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut config = super::load(global)?;
    apply_overrides(&mut config, &args);

    let _log_guard = logging::init_server(global.verbose, &config.log)?;

    config.validate()?;
    let server_config = config.server_config()?;
    let registry = config.client_registry()?;
    info!(
        clients = registry.len(),
        accept_any = registry.accepts_any(),
        "client registry loaded"
    );

    let backend = Backend::open(&config, false).await?;
    info!(store = %backend.describe(&config), "policy store ready");

    let server = Server::bind(server_config, registry, backend.policy(), backend.audit()).await?;
    info!(auth = %server.auth_addr()?, "bound authentication listener");

    let cancel = server.cancel_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, draining");
        cancel.cancel();
    });

    server.run().await;
    backend.close().await;
    info!("radvlan stopped");
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &ServeArgs) {
    if let Some(bind) = args.bind {
        config.server.bind = bind.to_string();
    }
    if let Some(port) = args.auth_port {
        config.server.auth_port = port;
    }
    if args.memory {
        config.store.backend = StoreBackend::Memory;
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let mut config = Config::default();
        let args = ServeArgs {
            bind: Some("127.0.0.1".parse().unwrap()),
            auth_port: Some(11812),
            memory: true,
        };
        apply_overrides(&mut config, &args);

        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.auth_port, 11812);
        assert_eq!(config.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn no_overrides_leave_config_untouched() {
        let mut config = Config::default();
        let before = config.server.auth_port;
        apply_overrides(
            &mut config,
            &ServeArgs {
                bind: None,
                auth_port: None,
                memory: false,
            },
        );
        assert_eq!(config.server.auth_port, before);
        assert_eq!(config.store.backend, StoreBackend::Mysql);
    }
}
