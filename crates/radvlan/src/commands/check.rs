//! `radvlan check-config`: validate the layered configuration.

use std::net::{IpAddr, SocketAddr};

use serde::Serialize;

use radvlan_config::{Config, StoreBackend};

use crate::cli::{CheckArgs, GlobalOpts};
use crate::commands::Backend;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct ConfigSummary {
    config_file: String,
    auth_listener: SocketAddr,
    acct_listener: Option<SocketAddr>,
    clients: Vec<ClientSummary>,
    accept_any: bool,
    store: String,
    store_reachable: Option<bool>,
    lookup_timeout_ms: u64,
    dedup_window_ms: u64,
    log_level: String,
}

#[derive(Debug, Serialize)]
struct ClientSummary {
    name: String,
    address: IpAddr,
}

pub async fn handle(args: &CheckArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = super::load(global)?;
    let mut summary = summarize(&config, global)?;

    if args.connect {
        let backend = Backend::open(&config, false).await?;
        let ping = backend.policy().ping().await;
        backend.close().await;
        ping?;
        summary.store_reachable = Some(true);
    }

    let out = output::render(global.output, &summary, render_text)?;
    output::print_output(&out, global.quiet)
}

/// Validate and resolve everything that does not need the network.
fn summarize(config: &Config, global: &GlobalOpts) -> Result<ConfigSummary, CliError> {
    config.validate()?;
    let server = config.server_config()?;
    let registry = config.client_registry()?;

    let mut clients: Vec<ClientSummary> = registry
        .clients()
        .map(|(address, client)| ClientSummary {
            name: client.name.clone(),
            address: *address,
        })
        .collect();
    clients.sort_by_key(|c| c.address);

    let store = match config.store.backend {
        StoreBackend::Memory => format!(
            "memory ({} exact, {} prefix, default {})",
            config.policy.exact.len(),
            config.policy.prefixes.len(),
            config
                .policy
                .default
                .as_ref()
                .filter(|d| d.enabled)
                .map_or_else(|| "off".to_owned(), |d| format!("vlan {}", d.vlan)),
        ),
        StoreBackend::Mysql => format!(
            "mysql {}@{}:{}/{}",
            config.store.user, config.store.host, config.store.port, config.store.name
        ),
    };

    let config_file = global
        .config
        .clone()
        .unwrap_or_else(radvlan_config::config_path);

    Ok(ConfigSummary {
        config_file: config_file.display().to_string(),
        auth_listener: server.auth_addr(),
        acct_listener: server.acct_addr(),
        clients,
        accept_any: registry.accepts_any(),
        store,
        store_reachable: None,
        lookup_timeout_ms: config.server.lookup_timeout_ms,
        dedup_window_ms: config.server.dedup_window_ms,
        log_level: config.log.level.clone(),
    })
}

fn render_text(s: &ConfigSummary) -> String {
    let mut lines = vec![
        format!("Config:       {}", s.config_file),
        format!("Auth:         {}", s.auth_listener),
        format!(
            "Accounting:   {}",
            s.acct_listener
                .map_or_else(|| "disabled".to_owned(), |a| a.to_string())
        ),
        format!("Store:        {}", s.store),
    ];
    if let Some(reachable) = s.store_reachable {
        lines.push(format!(
            "Reachable:    {}",
            if reachable { "yes" } else { "no" }
        ));
    }
    lines.push(format!(
        "Accept any:   {}",
        if s.accept_any { "yes" } else { "no" }
    ));
    lines.push(format!("Clients:      {}", s.clients.len()));
    for client in &s.clients {
        lines.push(format!("  {:<15} {}", client.address, client.name));
    }
    lines.push(format!("Lookup:       {} ms timeout", s.lookup_timeout_ms));
    lines.push(format!("Dedup window: {} ms", s.dedup_window_ms));
    lines.push(format!("Log level:    {}", s.log_level));
    lines.push("Configuration OK".to_owned());
    lines.join("\n")
}
