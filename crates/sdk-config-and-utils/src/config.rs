//! Configuration management for the SDK.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use token_store::TokenStoreKind;
use tracing::info;
use url::Url;

/// Default backend URL (can be overridden at compile time via DRIVER_AUTH_BASE_URL).
pub const DEFAULT_BASE_URL: &str = match option_env!("DRIVER_AUTH_BASE_URL") {
    Some(url) => url,
    None => "https://partner-driver.example.com/",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default app version reported to the backend.
pub const DEFAULT_APP_VERSION: &str = "DA.1.0";

/// Device fingerprint sent with every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Stable device identifier. Generated once when empty.
    #[serde(default)]
    pub device_id: String,
    /// Platform name, e.g. "android" or "iphone".
    pub device_type: String,
    /// Human-readable device model.
    #[serde(default)]
    pub device_name: String,
    /// OS version string.
    pub device_os_version: String,
    /// Client app version string.
    pub app_version: String,
}

impl DeviceInfo {
    /// Names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.device_id.trim().is_empty() {
            missing.push("device_id");
        }
        if self.device_type.trim().is_empty() {
            missing.push("device_type");
        }
        if self.device_os_version.trim().is_empty() {
            missing.push("device_os_version");
        }
        if self.app_version.trim().is_empty() {
            missing.push("app_version");
        }
        missing
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            device_type: "android".to_string(),
            device_name: "driver-sdk".to_string(),
            device_os_version: "14".to_string(),
            app_version: DEFAULT_APP_VERSION.to_string(),
        }
    }
}

/// Locale and brand configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    /// ISO country code, e.g. "pl".
    pub country: String,
    /// Language tag, e.g. "en-GB".
    pub language: String,
    /// Brand identifier the app is built for.
    #[serde(default = "default_brand")]
    pub brand: String,
}

fn default_brand() -> String {
    "default".to_string()
}

impl Locale {
    /// Names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.country.trim().is_empty() {
            missing.push("country");
        }
        if self.language.trim().is_empty() {
            missing.push("language");
        }
        missing
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            country: "pl".to_string(),
            language: "en-GB".to_string(),
            brand: default_brand(),
        }
    }
}

/// Which token store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON snapshot file under the base directory.
    #[default]
    File,
    /// In-process only; nothing survives a restart.
    Memory,
}

/// Main SDK configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Backend base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Device fingerprint.
    #[serde(default)]
    pub device: DeviceInfo,
    /// Locale and brand.
    #[serde(default)]
    pub locale: Locale,
    /// Token store backend.
    #[serde(default)]
    pub store: StoreBackend,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            base_url: default_base_url(),
            device: DeviceInfo::default(),
            locale: Locale::default(),
            store: StoreBackend::default(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then the config file, then environment.
    ///
    /// A blank device id is replaced with a fresh UUID and written back so
    /// the device fingerprint stays stable between runs.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());

        if config.device.device_id.trim().is_empty() {
            config.device.device_id = uuid::Uuid::new_v4().to_string();
            info!(device_id = %config.device.device_id, "Generated new device id");
            config.save(paths)?;
        }

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override fields from environment-style lookups.
    ///
    /// Recognised keys: `DRIVER_AUTH_LOG_LEVEL`, `DRIVER_AUTH_BASE_URL`,
    /// `DRIVER_AUTH_STORE` (`file` or `memory`). Blank values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(level) = non_empty("DRIVER_AUTH_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = non_empty("DRIVER_AUTH_BASE_URL") {
            self.base_url = url;
        }
        if let Some(store) = non_empty("DRIVER_AUTH_STORE") {
            match store.trim().to_ascii_lowercase().as_str() {
                "memory" => self.store = StoreBackend::Memory,
                "file" => self.store = StoreBackend::File,
                other => {
                    tracing::warn!(value = %other, "Ignoring unknown DRIVER_AUTH_STORE value");
                }
            }
        }
    }

    /// Get the backend URL as a parsed URL.
    ///
    /// A trailing slash is added when missing so relative endpoint paths
    /// join under the configured prefix.
    pub fn base_url(&self) -> CoreResult<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw)?;
        if url.cannot_be_a_base() {
            return Err(CoreError::Config(format!(
                "base_url cannot be used as a base: {}",
                self.base_url
            )));
        }
        Ok(url)
    }

    /// Resolve the configured token store against the filesystem layout.
    pub fn token_store_kind(&self, paths: &Paths) -> TokenStoreKind {
        match self.store {
            StoreBackend::File => TokenStoreKind::File(paths.session_file()),
            StoreBackend::Memory => TokenStoreKind::Memory,
        }
    }
}
