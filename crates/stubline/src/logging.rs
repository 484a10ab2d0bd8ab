//! Tracing subscriber setup for binaries and ad-hoc harnesses.
//!
//! Library code only emits events; installing a subscriber is left to the
//! process entry point.

use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber. `RUST_LOG` wins over `default_level`.
///
/// Calling this again after a subscriber is installed is a no-op.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("Tracing initialized (default level: {})", default_level);
    }
}

