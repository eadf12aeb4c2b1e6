//! Tracing setup.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber.
///
/// Honors `RUST_LOG` when set; `verbose` lowers the default level to debug.
/// Safe to call more than once, later calls are no-ops.
pub fn init(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
