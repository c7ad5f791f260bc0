//! Logging utilities
//!
//! Thin wrapper over the `log` facade with `env_logger` as the backend.
//! Applications call [`init`] once at startup; log output is controlled
//! through the `RUST_LOG` environment variable.

pub use log::{debug, error, info, trace, warn};

/// Initialize the global logger.
///
/// Safe to call once per process. Subsequent calls are ignored.
pub fn init() {
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .try_init();
}
