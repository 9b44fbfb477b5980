//! `radvlan init-config`: write a starter configuration.

use radvlan_config::{Config, NasEntry};

use crate::cli::{GlobalOpts, InitArgs};
use crate::error::CliError;
use crate::output;

/// Defaults plus one example NAS whose secret comes from the environment.
fn starter_config() -> Config {
    let mut config = Config::default();
    config.clients.nas.push(NasEntry {
        name: "ap-example".into(),
        address: "192.0.2.10".into(),
        secret: None,
        secret_env: Some("RADIUS_SECRET".into()),
    });
    config
}

pub fn handle(args: &InitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global
        .config
        .clone()
        .unwrap_or_else(radvlan_config::config_path);

    if path.exists() && !args.force {
        return Err(CliError::ConfigExists {
            path: path.display().to_string(),
        });
    }

    radvlan_config::save_config(&starter_config(), &path)?;
    output::print_output(&format!("Wrote {}", path.display()), global.quiet)
}
