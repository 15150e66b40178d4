//! Request construction shared by every backend call.

use crate::transport::{ApiRequest, Method};
use crate::{AuthError, AuthResult};
use sdk_config_and_utils::{DeviceInfo, Locale};
use serde::{Deserialize, Serialize};
use url::Url;

/// Backend endpoints, relative to the base URL.
pub mod endpoints {
    pub const START_AUTHENTICATION: &str = "driver/startAuthentication";
    pub const CONFIRM_AUTHENTICATION: &str = "driver/confirmAuthentication";
    pub const SEND_MAGIC_LINK: &str = "driver/sendMagicLink";
    pub const AUTHENTICATE_WITH_MAGIC_LINK: &str = "driver/authenticateWithMagicLink";
    pub const GET_ACCESS_TOKEN: &str = "driver/getAccessToken";
    /// Lightweight authenticated call used to probe a session.
    pub const GET_DRIVER_STATE: &str = "driver/getDriverState";
}

/// Device position reported with location-aware calls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// Device fingerprint and locale sent with every request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientContext {
    pub device: DeviceInfo,
    pub locale: Locale,
}

impl ClientContext {
    pub fn new(device: DeviceInfo, locale: Locale) -> Self {
        Self { device, locale }
    }

    /// Check that every required field is present.
    pub fn validate(&self) -> AuthResult<()> {
        let mut missing = self.device.missing_fields();
        missing.extend(self.locale.missing_fields());
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthError::validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Builds [`ApiRequest`]s against one backend.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: Url,
}

impl RequestBuilder {
    /// `base_url` should end with `/` so endpoints join beneath it.
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Request to `endpoint` carrying the common query parameters.
    pub fn request(
        &self,
        method: Method,
        endpoint: &str,
        context: &ClientContext,
        location: Option<&Location>,
    ) -> AuthResult<ApiRequest> {
        let url = self.base_url.join(endpoint.trim_start_matches('/'))?;
        let device = &context.device;
        let locale = &context.locale;

        let mut request = ApiRequest::new(method, url)
            .with_query("device_id", device.device_id.as_str())
            .with_query("device_type", device.device_type.as_str())
            .with_query("device_name", device.device_name.as_str())
            .with_query("device_os_version", device.device_os_version.as_str())
            .with_query("version", device.app_version.as_str())
            .with_query("country", locale.country.as_str())
            .with_query("language", locale.language.as_str())
            .with_query("brand", locale.brand.as_str());

        if let Some(location) = location {
            request = request
                .with_query("lat", location.lat.to_string())
                .with_query("lng", location.lng.to_string());
        }

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ClientContext {
        ClientContext::new(
            DeviceInfo {
                device_id: "dev-1".to_string(),
                ..DeviceInfo::default()
            },
            Locale::default(),
        )
    }

    #[test]
    fn test_validate_reports_missing_fields() {
        assert!(context().validate().is_ok());

        let mut ctx = context();
        ctx.device.device_id.clear();
        ctx.locale.language = "  ".to_string();
        match ctx.validate().unwrap_err() {
            AuthError::Validation { message, payload } => {
                assert!(message.contains("device_id"));
                assert!(message.contains("language"));
                assert!(payload.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_request_carries_common_params() {
        let builder = RequestBuilder::new(Url::parse("https://api.example.com/v1/").unwrap());
        let request = builder
            .request(
                Method::Post,
                endpoints::START_AUTHENTICATION,
                &context(),
                Some(&Location { lat: 52.1, lng: 21.0 }),
            )
            .unwrap();

        assert_eq!(
            request.url.as_str(),
            "https://api.example.com/v1/driver/startAuthentication"
        );
        assert_eq!(request.query_param("device_id"), Some("dev-1"));
        assert_eq!(request.query_param("device_type"), Some("android"));
        assert_eq!(request.query_param("country"), Some("pl"));
        assert_eq!(request.query_param("version"), Some("DA.1.0"));
        assert_eq!(request.query_param("lat"), Some("52.1"));
        assert_eq!(request.query_param("lng"), Some("21"));
    }

    #[test]
    fn test_request_without_location() {
        let builder = RequestBuilder::new(Url::parse("https://api.example.com/").unwrap());
        let request = builder
            .request(Method::Get, "/driver/getDriverState", &context(), None)
            .unwrap();
        assert_eq!(request.url.path(), "/driver/getDriverState");
        assert_eq!(request.query_param("lat"), None);
    }
}
