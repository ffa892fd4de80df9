//! Tracing subscriber setup for the `kwtag` binary.

use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber. `RUST_LOG` wins over the configured
/// filter. Safe to call more than once; later calls are ignored.
pub fn init(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
