//! Subscriber setup for the `tracing` events the framework emits.

use tracing_subscriber::EnvFilter;

/// Installs a formatted subscriber. `RUST_LOG` takes precedence over
/// `default_filter`. Does nothing if a global subscriber is already set.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("global subscriber already installed");
    }
}
