//! Credential, identity and the persisted snapshot that joins them.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder id used when token claims could not be read.
pub const PLACEHOLDER_ID: i64 = 1;

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Bearer credential authorizing requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    /// Empty when the backend issued no refresh-capable token.
    #[serde(default)]
    pub refresh_token: String,
    pub token_type: String,
    /// Expiry as epoch milliseconds.
    pub expires_at: i64,
}

impl Credential {
    /// True once `now_ms` has reached the expiry instant.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// True when neither token is usable.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty() && self.refresh_token.is_empty()
    }

    /// Expiry as a UTC timestamp, if representable.
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.expires_at).single()
    }
}

/// Driver identity read from token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub session_id: String,
    /// `0` means the claims have not been resolved yet.
    pub driver_id: i64,
    pub partner_id: i64,
    pub company_id: i64,
    pub company_city_id: i64,
    /// Set when the ids are placeholders rather than real claims.
    #[serde(default)]
    pub degraded: bool,
}

impl Identity {
    /// Identity with every id unresolved.
    pub fn unresolved(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            driver_id: 0,
            partner_id: 0,
            company_id: 0,
            company_city_id: 0,
            degraded: false,
        }
    }

    /// Stand-in identity used when claims extraction failed.
    pub fn placeholder(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            driver_id: PLACEHOLDER_ID,
            partner_id: PLACEHOLDER_ID,
            company_id: PLACEHOLDER_ID,
            company_city_id: PLACEHOLDER_ID,
            degraded: true,
        }
    }

    /// True when the ids come from real claims.
    pub fn is_resolved(&self) -> bool {
        self.driver_id != 0 && !self.degraded
    }

    /// True when claims should be read again from the access token.
    pub fn needs_claims(&self) -> bool {
        !self.is_resolved()
    }
}

/// On-disk / in-memory representation of one live session.
///
/// Serialized as `{ token, sessionInfo, savedAt, expiresAt }` with
/// `savedAt` as RFC 3339 and `expiresAt` as epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSnapshot {
    pub token: Credential,
    pub session_info: Identity,
    pub saved_at: DateTime<Utc>,
    pub expires_at: i64,
}

impl StoredSnapshot {
    /// Snapshot of `credential`/`identity` stamped with the current time.
    pub fn new(credential: Credential, identity: Identity) -> Self {
        let expires_at = credential.expires_at;
        Self {
            token: credential,
            session_info: identity,
            saved_at: Utc::now(),
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }
}
