//! Structured logging setup.
//!
//! The library only emits `tracing` events. Binaries call [`init_tracing`]
//! once; `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

use crate::{Error, Result};

/// Install the global subscriber, writing to stderr.
///
/// # Errors
///
/// Returns an error if a subscriber is already installed.
pub fn init_tracing(level: &str, json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let installed = if json {
        let json_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(json_layer).try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact();

        Registry::default().with(env_filter).with(fmt_layer).try_init()
    };

    installed.map_err(|e| Error::internal(format!("failed to install tracing subscriber: {e}")))?;

    tracing::debug!(level, json, "Tracing initialized");
    Ok(())
}
