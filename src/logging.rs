//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Level resolution order:
//! 1. `HYDRACTL_LOG` environment variable (full `EnvFilter` syntax)
//! 2. `--verbose` CLI flag (debug)
//! 3. default `info`

use tracing_subscriber::EnvFilter;

/// Initialise the global subscriber. Call once at startup.
pub fn init(verbose: bool) {
    let default_directive = if verbose { "hydractl=debug" } else { "hydractl=info" };

    let filter = EnvFilter::try_from_env("HYDRACTL_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
