//! Magic-link URL parsing.
//!
//! Sign-in emails link to a URL carrying a `token` query parameter. Mail
//! tracking often wraps that URL as `https://<host>/.../L0/<urlencoded target>/...`,
//! so one level of wrapper is removed before reading the parameter.

use crate::{AuthError, AuthResult};
use url::Url;

const TRACKING_MARKER: &str = "awstrack.me";
const WRAPPED_TARGET_SEGMENT: &str = "L0";

/// Extract the sign-in token from a magic-link URL.
pub fn parse_magic_link_token(raw: &str) -> AuthResult<String> {
    let mut url = Url::parse(raw.trim())?;

    if is_tracking_wrapper(&url) {
        url = unwrap_tracking_url(&url)?;
    }

    url.query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::validation("magic link has no token parameter"))
}

fn is_tracking_wrapper(url: &Url) -> bool {
    let host_matches = url
        .host_str()
        .map(|host| host.ends_with(TRACKING_MARKER))
        .unwrap_or(false);
    host_matches || url.path().contains(TRACKING_MARKER)
}

fn unwrap_tracking_url(url: &Url) -> AuthResult<Url> {
    // Use the raw path so the encoded target is still one segment.
    let mut segments = url.path().split('/');
    let encoded = segments
        .by_ref()
        .find(|segment| *segment == WRAPPED_TARGET_SEGMENT)
        .and_then(|_| segments.next())
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| AuthError::validation("tracking link has no wrapped target"))?;

    let target = urlencoding::decode(encoded)
        .map_err(|e| AuthError::validation(format!("tracking target is not valid UTF-8: {}", e)))?;
    Ok(Url::parse(&target)?)
}
