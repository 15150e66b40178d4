//! Configuration, filesystem layout, and logging setup for the driver SDK.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DeviceInfo, Locale, StoreBackend, DEFAULT_APP_VERSION,
    DEFAULT_BASE_URL, DEFAULT_LOG_LEVEL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, SERVICE_NAME};
pub use paths::Paths;
