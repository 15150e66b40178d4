//! Errors raised while resolving SDK settings and the on-disk layout.

use thiserror::Error;

/// Failure to produce a usable [`Config`](crate::Config) or [`Paths`](crate::Paths).
#[derive(Error, Debug)]
pub enum CoreError {
    /// A setting was present but unusable, e.g. a base URL that cannot be joined.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading `config.json` or creating the base directory failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `base_url` did not parse.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// `config.json` is not valid JSON for [`Config`](crate::Config).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No home directory to place `~/.driver-auth` in.
    #[error("Path error: {0}")]
    Path(String),
}

/// Result alias for configuration loading.
pub type CoreResult<T> = Result<T, CoreError>;
