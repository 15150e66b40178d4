//! Mapping of backend responses to [`AuthError`].
//!
//! Every backend reply is an envelope `{ code, message?, data? }`. A reply
//! succeeds only when the HTTP status is 2xx and `code` is 0 (an absent
//! code on a 2xx counts as 0).

use crate::transport::{ApiResponse, TransportError};
use crate::AuthError;
use serde_json::Value;

/// SMS sending rate limit reached.
pub const CODE_SMS_LIMIT: i64 = 299;
/// SMS verification code invalid or expired.
pub const CODE_INVALID_SMS_CODE: i64 = 293;
/// Backend storage failure.
pub const CODE_DATABASE: i64 = 1000;
/// Phone number malformed.
pub const CODE_INVALID_PHONE: i64 = 17500;

/// How failures of a given endpoint are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMapping {
    /// Full taxonomy via [`classify`].
    Typed,
    /// Always [`AuthError::Api`], for channels without structured codes.
    Generic,
}

/// Numeric `code` of a backend payload.
pub fn backend_code(payload: &Value) -> Option<i64> {
    payload.get("code").and_then(Value::as_i64)
}

fn backend_message(payload: &Value) -> Option<String> {
    payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Classify a failed response.
///
/// A recognised backend `code` wins over the HTTP status. Otherwise 401
/// is an authentication failure, 400 a validation failure, and anything else
/// a generic API error. Status 0 means no response was received.
pub fn classify(status: u16, payload: Option<Value>) -> AuthError {
    let code = payload.as_ref().and_then(backend_code);

    if let (Some(code), Some(body)) = (code, payload.as_ref()) {
        match code {
            CODE_SMS_LIMIT => return AuthError::SmsLimit { payload: body.clone() },
            CODE_INVALID_PHONE => return AuthError::InvalidPhone { payload: body.clone() },
            CODE_DATABASE => return AuthError::Database { payload: body.clone() },
            CODE_INVALID_SMS_CODE => {
                return AuthError::InvalidSmsCode {
                    payload: body.clone(),
                }
            }
            _ => {}
        }
    }

    let message = payload
        .as_ref()
        .and_then(backend_message)
        .unwrap_or_else(|| default_message(status, code));

    match status {
        401 => AuthError::Authentication { message, payload },
        400 => AuthError::Validation { message, payload },
        _ => AuthError::Api {
            status,
            code,
            message,
            payload,
        },
    }
}

/// Generic request failure carrying status, code and payload.
pub fn request_failure(status: u16, payload: Option<Value>) -> AuthError {
    let code = payload.as_ref().and_then(backend_code);
    let message = payload
        .as_ref()
        .and_then(backend_message)
        .unwrap_or_else(|| default_message(status, code));
    AuthError::Api {
        status,
        code,
        message,
        payload,
    }
}

/// Failure to obtain any response at all.
pub fn classify_transport_error(error: &TransportError) -> AuthError {
    AuthError::Api {
        status: 0,
        code: None,
        message: error.to_string(),
        payload: None,
    }
}

/// Unwrap the `data` field of a successful envelope, or classify the failure.
pub fn check_envelope(response: ApiResponse, mapping: ErrorMapping) -> Result<Value, AuthError> {
    let code = backend_code(&response.data).unwrap_or(0);

    if response.is_success() && code == 0 {
        let data = match response.data {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        };
        return Ok(data);
    }

    let payload = match response.data {
        Value::Null => None,
        other => Some(other),
    };
    Err(match mapping {
        ErrorMapping::Typed => classify(response.status, payload),
        ErrorMapping::Generic => request_failure(response.status, payload),
    })
}

fn default_message(status: u16, code: Option<i64>) -> String {
    match (status, code) {
        (0, _) => "no response from backend".to_string(),
        (_, Some(code)) => format!("backend returned code {}", code),
        (status, None) => format!("HTTP {}", status),
    }
}
