//! Tracing subscriber setup.
//!
//! One-shot commands log to stderr at `warn` so stdout stays clean for
//! their output. `serve` logs to stdout at the configured level and can
//! additionally append to a file.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use radvlan_config::{LogFormat, LogSection};

use crate::error::CliError;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn verbosity_filter(verbosity: u8) -> Option<&'static str> {
    match verbosity {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Subscriber for one-shot commands.
pub fn init_cli(verbosity: u8) {
    let filter = verbosity_filter(verbosity).unwrap_or("warn");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Subscriber for the server. Keep the returned guard alive until exit
/// or buffered file output is lost.
pub fn init_server(verbosity: u8, log: &LogSection) -> Result<Option<WorkerGuard>, CliError> {
    let filter = verbosity_filter(verbosity).unwrap_or(log.level.as_str());
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|e| CliError::Validation {
            field: "log.level".into(),
            reason: e.to_string(),
        })?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let stdout = fmt::layer().with_target(false);
    layers.push(match log.format {
        LogFormat::Text => stdout.boxed(),
        LogFormat::Json => stdout.json().boxed(),
    });

    let guard = match &log.file {
        Some(path) => {
            let (layer, guard) = file_layer(path)?;
            layers.push(layer);
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| CliError::Internal {
            message: format!("tracing already initialized: {e}"),
        })?;
    Ok(guard)
}

/// Append-only JSON lines, one file, no rotation.
fn file_layer(path: &Path) -> Result<(BoxedLayer, WorkerGuard), CliError> {
    let file_name = path.file_name().ok_or_else(|| CliError::Validation {
        field: "log.file".into(),
        reason: format!("{} has no file name", path.display()),
    })?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(writer)
        .boxed();
    Ok((layer, guard))
}
