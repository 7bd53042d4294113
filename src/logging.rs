//! Log output for the command-line front end.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the binary.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Installs a stderr subscriber. `RUST_LOG` wins; otherwise `verbose` picks
/// between `info` and `debug` for this crate.
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let default = if verbose { "hornclip=debug,info" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_thread_names(verbose),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Logging already initialized: {e}"))?;

    tracing::debug!("logging initialized");
    Ok(())
}
