//! Logging initialization for SDK binaries.
//!
//! Thin wrapper over the observability crate so binaries only need the
//! configured level and an optional log file.

use std::path::PathBuf;

pub use observability::LogConfig;

/// Service name written into every JSONL entry.
pub const SERVICE_NAME: &str = "driver-auth";

/// Initialize logging for an SDK binary.
///
/// Events go to stderr and, when `log_file` is given, to that JSONL file.
/// `RUST_LOG` takes precedence over `level`.
///
/// ```ignore
/// init_logging("info", Some(paths.log_file()));
/// tracing::info!("started");
/// ```
pub fn init_logging(level: &str, log_file: Option<PathBuf>) {
    observability::init_with_config(LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: level.into(),
        log_path: log_file,
        also_stderr: true,
    });
}
