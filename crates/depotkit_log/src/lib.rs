//! `depotkit_log` v1:
//! Process-wide `tracing` subscriber setup for depotkit binaries.
//!
//! `RUST_LOG` wins when set; otherwise the CLI verbosity picks the level.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Subscriber installation failure (usually: already installed).
#[derive(Debug, thiserror::Error)]
#[error("Failed to initialize logging: {0}")]
pub struct LogInitError(String);

/// Default filter directive for a `-v` count.
pub fn derive_default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Filter from `RUST_LOG`, falling back to the verbosity default.
pub fn derive_env_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(derive_default_directive(verbosity)))
}

/// Install a stderr fmt subscriber.
pub fn init_logging(verbosity: u8) -> Result<(), LogInitError> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(derive_env_filter(verbosity))
        .try_init()
        .map_err(|e| LogInitError(e.to_string()))?;
    tracing::debug!("logging initialized (verbosity={verbosity})");
    Ok(())
}
