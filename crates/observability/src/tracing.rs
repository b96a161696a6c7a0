//! JSON log output filtered by `RUST_LOG`.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_LEVEL: &str = "info";

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set and valid; otherwise `default_level` (for example
/// the configured `STOCKROOM_LOG`) is used. A second call is a no-op.
pub fn init_with_level(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
