//! Structured logging setup
//!
//! Repository, store and mapper code only emits `tracing` events. Binaries
//! embedding the crate install a subscriber once at startup with
//! [`init_tracing`].

use tracing_subscriber::EnvFilter;

use crate::{config::Config, error::Error, error::Result};

/// Install a JSON `tracing` subscriber filtered by `service.log_level`
///
/// An unparsable level falls back to `info`.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(config: &Config) -> Result<()> {
    let log_level = config.service.log_level.clone();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| Error::Tracing(e.to_string()))?;

    tracing::info!("Tracing initialized for service: {}", config.service.name);

    Ok(())
}
