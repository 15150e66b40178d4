//! Authentication error types.

use serde_json::Value;
use thiserror::Error;
use token_store::StorageError;

/// Authentication error type.
///
/// Variants produced from a backend response keep the response body
/// verbatim in `payload`.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Local precondition violated, or the backend rejected the request as malformed (HTTP 400)
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        payload: Option<Value>,
    },

    /// Missing or rejected credential (HTTP 401, or no usable token locally)
    #[error("Authentication error: {message}")]
    Authentication {
        message: String,
        payload: Option<Value>,
    },

    /// Too many SMS codes requested
    #[error("SMS limit exceeded")]
    SmsLimit { payload: Value },

    /// Phone number rejected by the backend
    #[error("Invalid phone number")]
    InvalidPhone { payload: Value },

    /// SMS code wrong or expired
    #[error("Invalid or expired SMS code")]
    InvalidSmsCode { payload: Value },

    /// Backend reported a storage failure
    #[error("Backend database error")]
    Database { payload: Value },

    /// Any other failed request. `status` is 0 when no response was received.
    #[error("API error (HTTP {status}, code {code:?}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
        payload: Option<Value>,
    },

    /// Bearer token claims could not be decoded
    #[error("Token decode error: {0}")]
    Decode(String),

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Token store error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Fieldless discriminant of [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    Validation,
    Authentication,
    SmsLimit,
    InvalidPhone,
    InvalidSmsCode,
    Database,
    Api,
    Decode,
    InvalidStateTransition,
    Config,
    InvalidUrl,
    Storage,
}

impl AuthError {
    /// Local validation failure; never sent over the wire.
    pub fn validation(message: impl Into<String>) -> Self {
        AuthError::Validation {
            message: message.into(),
            payload: None,
        }
    }

    /// Local authentication failure (no usable credential).
    pub fn authentication(message: impl Into<String>) -> Self {
        AuthError::Authentication {
            message: message.into(),
            payload: None,
        }
    }

    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::Validation { .. } => AuthErrorKind::Validation,
            AuthError::Authentication { .. } => AuthErrorKind::Authentication,
            AuthError::SmsLimit { .. } => AuthErrorKind::SmsLimit,
            AuthError::InvalidPhone { .. } => AuthErrorKind::InvalidPhone,
            AuthError::InvalidSmsCode { .. } => AuthErrorKind::InvalidSmsCode,
            AuthError::Database { .. } => AuthErrorKind::Database,
            AuthError::Api { .. } => AuthErrorKind::Api,
            AuthError::Decode(_) => AuthErrorKind::Decode,
            AuthError::InvalidStateTransition(_) => AuthErrorKind::InvalidStateTransition,
            AuthError::Config(_) => AuthErrorKind::Config,
            AuthError::InvalidUrl(_) => AuthErrorKind::InvalidUrl,
            AuthError::Storage(_) => AuthErrorKind::Storage,
        }
    }

    /// The backend response body behind this error, if any.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            AuthError::Validation { payload, .. }
            | AuthError::Authentication { payload, .. }
            | AuthError::Api { payload, .. } => payload.as_ref(),
            AuthError::SmsLimit { payload }
            | AuthError::InvalidPhone { payload }
            | AuthError::InvalidSmsCode { payload }
            | AuthError::Database { payload } => Some(payload),
            _ => None,
        }
    }

    /// Backend numeric `code` carried by the payload, if any.
    pub fn backend_code(&self) -> Option<i64> {
        match self {
            AuthError::Api { code, .. } => *code,
            other => other
                .payload()
                .and_then(|p| p.get("code"))
                .and_then(Value::as_i64),
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
