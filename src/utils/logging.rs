//! Logging utilities
//!
//! Provides logging setup and configuration.

/// Install `env_logger` once; `RUST_LOG` controls verbosity. Later calls,
/// or a host that already installed a logger, are left alone.
pub fn setup_logging() {
    let _ = env_logger::try_init();
}
