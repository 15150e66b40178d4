//! Bearer token claims reader.
//!
//! Tokens are three dot-separated segments; the middle one is base64url JSON
//! of the form `{ "exp": <seconds>, "data": { "driver_id": .., ... } }`.
//!
//! No signature verification is performed. Trust in a token comes from it
//! having been issued over an authenticated channel, so this is a claims
//! reader and never a verifier.

use crate::{AuthError, AuthResult};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde_json::Value;
use token_store::Identity;

/// Standard alphabet decoder that accepts padded and unpadded input.
const CLAIMS_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Identity fields and expiry read from a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub driver_id: i64,
    pub partner_id: i64,
    pub company_id: i64,
    pub company_city_id: i64,
    /// `exp` converted to epoch milliseconds.
    pub expires_at: Option<i64>,
}

impl TokenClaims {
    /// Identity for `session_id` built from these claims.
    pub fn identity(&self, session_id: impl Into<String>) -> Identity {
        Identity {
            session_id: session_id.into(),
            driver_id: self.driver_id,
            partner_id: self.partner_id,
            company_id: self.company_id,
            company_city_id: self.company_city_id,
            degraded: false,
        }
    }
}

/// Read the claims of `token`.
///
/// Fails with [`AuthError::Decode`] only when the envelope is malformed:
/// wrong segment count, bad base64, or a middle segment that is not a JSON
/// object. Missing ids default to 0.
pub fn extract_claims(token: &str) -> AuthResult<TokenClaims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(AuthError::Decode(format!(
            "expected 3 token segments, found {}",
            segments.len()
        )));
    }

    let normalized = segments[1].replace('-', "+").replace('_', "/");
    let bytes = CLAIMS_ENGINE
        .decode(normalized.as_bytes())
        .map_err(|e| AuthError::Decode(format!("invalid base64 in claims: {}", e)))?;

    let payload: Value = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::Decode(format!("claims are not JSON: {}", e)))?;
    if !payload.is_object() {
        return Err(AuthError::Decode("claims are not a JSON object".to_string()));
    }

    let data = payload.get("data");
    let id = |name: &str| data.and_then(|d| d.get(name)).map(read_id).unwrap_or(0);

    Ok(TokenClaims {
        driver_id: id("driver_id"),
        partner_id: id("partner_id"),
        company_id: id("company_id"),
        company_city_id: id("company_city_id"),
        expires_at: payload
            .get("exp")
            .and_then(Value::as_i64)
            .map(|secs| secs.saturating_mul(1000)),
    })
}

// Ids sometimes arrive as numeric strings.
fn read_id(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Outcome of reading identity from a freshly issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityResolution {
    Resolved(TokenClaims),
    /// Claims were unreadable; `placeholder` stands in with ids = 1.
    Degraded { placeholder: Identity, reason: String },
}

impl IdentityResolution {
    /// The identity to install for `session_id`.
    pub fn identity(&self, session_id: &str) -> Identity {
        match self {
            IdentityResolution::Resolved(claims) => claims.identity(session_id),
            IdentityResolution::Degraded { placeholder, .. } => placeholder.clone(),
        }
    }

    /// Token expiry, when the claims carried one.
    pub fn expires_at(&self) -> Option<i64> {
        match self {
            IdentityResolution::Resolved(claims) => claims.expires_at,
            IdentityResolution::Degraded { .. } => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, IdentityResolution::Degraded { .. })
    }
}

/// Resolve identity from `token`, degrading to placeholders on decode failure.
pub fn resolve_identity(token: &str, session_id: &str) -> IdentityResolution {
    match extract_claims(token) {
        Ok(claims) => IdentityResolution::Resolved(claims),
        Err(e) => IdentityResolution::Degraded {
            placeholder: Identity::placeholder(session_id),
            reason: e.to_string(),
        },
    }
}
