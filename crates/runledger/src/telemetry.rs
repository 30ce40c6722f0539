//! Logging setup.
//!
//! Storage code logs through the `log` facade, orchestration and refresh
//! through `tracing`. [`init_logging`] routes both into one
//! `tracing-subscriber` registry.

use std::sync::OnceLock;

use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ConfigError;

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber. `RUST_LOG` takes precedence over
/// `config.level`. Later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| ConfigError::Logging(format!("invalid level '{}': {}", config.level, e)))?,
    };

    // `try_init` would install its own `LogTracer`; the bridge is set up
    // below only once this call owns the dispatcher.
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Pretty => set_global_default(registry.with(fmt::layer().with_target(true))),
        LogFormat::Json => set_global_default(registry.with(fmt::layer().json())),
    };
    match installed {
        Ok(()) => {
            if let Err(e) = tracing_log::LogTracer::init() {
                tracing::debug!("log records not bridged, a logger is already set: {}", e);
            }
        }
        Err(e) => tracing::debug!("global subscriber already set: {}", e),
    }

    let _ = INITIALIZED.set(());
    Ok(())
}
