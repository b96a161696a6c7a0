//! Process-wide tracing setup shared by binaries, benches and tests.

/// Initialize tracing with the default `info` level.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init_with_level(tracing::DEFAULT_LEVEL);
}

/// Tracing configuration (filters, layers).
pub mod tracing;
