//! Session management for the Nakama client.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Claims carried in the JWT payload.
#[derive(Debug, Default, Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<u64>,
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    usn: Option<String>,
    #[serde(default)]
    vrs: HashMap<String, serde_json::Value>,
}

/// An authenticated user session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// JWT access token.
    pub token: String,
    /// Refresh token for renewing the session.
    pub refresh_token: Option<String>,
    pub user_id: String,
    pub username: Option<String>,
    /// Access token expiry, Unix milliseconds.
    pub expires_at_ms: u64,
    /// Refresh token expiry, Unix milliseconds.
    pub refresh_expires_at_ms: Option<u64>,
    /// Whether authentication created a new account.
    pub created: bool,
    /// When this session object was built, Unix milliseconds.
    pub created_at_ms: u64,
    vars: HashMap<String, String>,
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn decode_claims(token: &str) -> Result<Claims> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::invalid_token("expected three dot-separated segments"));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| Error::invalid_token(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&payload)
        .map_err(|e| Error::invalid_token(format!("payload is not a JSON object: {e}")))
}

impl Session {
    /// Build a session from tokens returned by an authenticate call.
    pub fn new(token: &str, refresh_token: Option<&str>, created: bool) -> Result<Self> {
        let claims = decode_claims(token)?;

        let mut vars = HashMap::new();
        for (name, value) in claims.vrs {
            match value {
                serde_json::Value::String(s) => {
                    vars.insert(name, s);
                }
                _ => tracing::warn!("non-string session variable ignored: {}", name),
            }
        }

        let refresh_token = refresh_token.filter(|t| !t.is_empty());
        let refresh_expires_at_ms = match refresh_token {
            Some(rt) => match decode_claims(rt) {
                Ok(Claims { exp: Some(exp), .. }) => Some(exp * 1000),
                Ok(_) => {
                    tracing::error!("could not find expiry on refresh token");
                    None
                }
                Err(e) => {
                    tracing::error!("refresh token: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            token: token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
            user_id: claims.uid.unwrap_or_default(),
            username: claims.usn,
            expires_at_ms: claims.exp.unwrap_or(0) * 1000,
            refresh_expires_at_ms,
            created,
            created_at_ms: now_ms(),
            vars,
        })
    }

    /// Rebuild a session from tokens stored by the application.
    pub fn restore(token: &str, refresh_token: Option<&str>) -> Result<Self> {
        Self::new(token, refresh_token, false)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_ms())
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Check if the session will expire within `window`.
    pub fn expires_within(&self, window: Duration) -> bool {
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        self.is_expired_at(now_ms().saturating_add(window_ms))
    }

    /// True when there is no usable refresh token left.
    pub fn is_refresh_expired(&self) -> bool {
        self.is_refresh_expired_at(now_ms())
    }

    pub fn is_refresh_expired_at(&self, now_ms: u64) -> bool {
        match self.refresh_expires_at_ms {
            Some(exp) => now_ms >= exp,
            None => true,
        }
    }

    /// Session variable set by the server at authentication.
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// Get the authorization header value.
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Get display name (username or user_id).
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.user_id)
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let remaining = self.expires_at_ms.saturating_sub(now_ms()) / 1000;
        write!(
            f,
            "Session {{ user: {}, expires_in: {}s }}",
            self.display_name(),
            remaining
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Unsigned JWT around `payload`.
    pub(crate) fn make_token(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.signature")
    }

    #[test]
    fn test_decodes_claims() {
        let token = make_token(&serde_json::json!({
            "exp": 1_900_000_000u64,
            "uid": "3c01e3ee-878a-4ec4-8923-40d51a86f91f",
            "usn": "player1",
            "vrs": { "region": "eu", "level": 7 }
        }));
        let refresh = make_token(&serde_json::json!({ "exp": 1_950_000_000u64 }));

        let session = Session::new(&token, Some(&refresh), true).unwrap();
        assert_eq!(session.user_id, "3c01e3ee-878a-4ec4-8923-40d51a86f91f");
        assert_eq!(session.username.as_deref(), Some("player1"));
        assert_eq!(session.expires_at_ms, 1_900_000_000_000);
        assert_eq!(session.refresh_expires_at_ms, Some(1_950_000_000_000));
        assert!(session.created);
        assert_eq!(session.variable("region"), Some("eu"));
        assert_eq!(session.variable("level"), None);
        assert_eq!(session.auth_header(), format!("Bearer {token}"));
    }

    #[test]
    fn test_expiry_checks() {
        let token = make_token(&serde_json::json!({ "exp": 1000, "uid": "u" }));
        let session = Session::restore(&token, None).unwrap();
        assert!(!session.is_expired_at(999_999));
        assert!(session.is_expired_at(1_000_000));
        assert!(session.is_expired());
        assert!(session.is_refresh_expired());
        assert!(!session.created);
        assert_eq!(session.display_name(), "u");
    }

    #[test]
    fn test_expires_within_large_window() {
        let token = make_token(&serde_json::json!({ "exp": 4_000_000_000u64, "uid": "u" }));
        let session = Session::restore(&token, None).unwrap();
        assert!(!session.expires_within(Duration::ZERO));
        assert!(session.expires_within(Duration::MAX));
        assert!(session.expires_within(Duration::from_secs(u64::MAX / 1000)));
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        assert!(matches!(Session::restore("abc", None), Err(Error::InvalidToken(_))));
        assert!(matches!(Session::restore("a.!!!.c", None), Err(Error::InvalidToken(_))));

        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("not json"));
        assert!(matches!(Session::restore(&not_json, None), Err(Error::InvalidToken(_))));
    }

    #[test]
    fn test_bad_refresh_token_is_tolerated() {
        let token = make_token(&serde_json::json!({ "exp": 2_000_000_000u64, "uid": "u" }));
        let session = Session::new(&token, Some("garbage"), false).unwrap();
        assert_eq!(session.refresh_token.as_deref(), Some("garbage"));
        assert_eq!(session.refresh_expires_at_ms, None);

        let session = Session::new(&token, Some(""), false).unwrap();
        assert_eq!(session.refresh_token, None);
    }
}
