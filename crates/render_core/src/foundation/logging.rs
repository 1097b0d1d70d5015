//! Logging utilities
//!
//! The crate logs through the `log` facade; hosts pick the backend. These
//! helpers install `env_logger` for binaries and tests that have none.

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system from `RUST_LOG`
///
/// Returns `false` when a logger was already installed.
pub fn init() -> bool {
    env_logger::try_init().is_ok()
}

/// Initialize the logging system with an explicit filter such as
/// `"render_core=debug"`, ignoring `RUST_LOG`
pub fn init_with_filter(filter: &str) -> bool {
    env_logger::Builder::new()
        .parse_filters(filter)
        .try_init()
        .is_ok()
}

/// Initialize logging for unit and integration tests
///
/// Safe to call from every test; output is captured by the test harness.
pub fn init_for_tests() {
    let _ = env_logger::builder().is_test(true).try_init();
}
