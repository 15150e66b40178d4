//! Response payloads of the sign-in endpoints (the `data` field of the envelope).

use crate::AuthError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// `driver/startAuthentication`
#[derive(Debug, Deserialize)]
pub(crate) struct StartAuthenticationData {
    pub verification_token: String,
}

/// Token object returned by the sign-in confirmations.
#[derive(Debug, Deserialize)]
pub(crate) struct IssuedToken {
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// `driver/confirmAuthentication`
#[derive(Debug, Deserialize)]
pub(crate) struct ConfirmAuthenticationData {
    #[serde(default)]
    pub token: Option<IssuedToken>,
}

/// `driver/authenticateWithMagicLink`
///
/// Seen both with the token at top level and nested under `token`.
#[derive(Debug, Deserialize)]
pub(crate) struct MagicLinkAuthData {
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub token: Option<IssuedToken>,
}

impl MagicLinkAuthData {
    pub fn into_token(self) -> Option<(String, Option<String>)> {
        let nested = self.token.and_then(|t| t.refresh_token.map(|r| (r, t.token_type)));
        match self.refresh_token {
            Some(refresh) if !refresh.is_empty() => Some((refresh, self.token_type)),
            _ => nested.filter(|(refresh, _)| !refresh.is_empty()),
        }
    }
}

/// `driver/getAccessToken`
#[derive(Debug, Deserialize)]
pub(crate) struct AccessTokenData {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Decode envelope `data` into `T`, keeping the payload on failure.
pub(crate) fn decode_data<T: DeserializeOwned>(data: Value, what: &str) -> Result<T, AuthError> {
    serde_json::from_value(data.clone()).map_err(|e| malformed(what, &e.to_string(), data))
}

/// A 2xx response whose payload lacks what the flow needs.
pub(crate) fn malformed(what: &str, detail: &str, data: Value) -> AuthError {
    AuthError::Api {
        status: 200,
        code: Some(0),
        message: format!("malformed {} response: {}", what, detail),
        payload: Some(data),
    }
}
