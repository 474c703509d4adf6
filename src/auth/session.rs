//! Session and user models, plus normalization of identity-service payloads.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::AuthError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Display name
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Authenticated identity plus credential, as persisted in the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// A session is valid iff `now < expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Build a [`Session`] from a sign-in or sign-up response.
///
/// Accepted envelopes, optionally wrapped in a top-level `data` object:
/// - `{user: {...}, session: {token, expiresAt?}}`
/// - `{user: {...}, token, expiresAt?}`
/// - `{session: {user: {...}, token, expiresAt?}}`
/// - flat `{id, email, name, token, expiresAt?}`
///
/// When no expiry is present the session lives for `default_ttl` from `now`.
pub fn normalize_auth_response(
    payload: &Value,
    default_ttl: Duration,
    now: DateTime<Utc>,
) -> Result<Session, AuthError> {
    let root = match payload.get("data") {
        Some(Value::Object(data)) => data,
        _ => payload
            .as_object()
            .ok_or_else(|| malformed("response is not a JSON object"))?,
    };
    let session_obj = root.get("session").and_then(Value::as_object);

    let user_obj = root
        .get("user")
        .and_then(Value::as_object)
        .or_else(|| session_obj.and_then(|s| s.get("user")).and_then(Value::as_object))
        .or_else(|| (root.contains_key("id") && root.contains_key("email")).then_some(root))
        .ok_or_else(|| malformed("missing user identity"))?;

    let token = session_obj
        .and_then(|s| non_empty_str(s, "token"))
        .or_else(|| non_empty_str(root, "token"))
        .ok_or_else(|| malformed("missing session token"))?;

    let expires_at = match session_obj
        .and_then(|s| s.get("expiresAt"))
        .or_else(|| root.get("expiresAt"))
    {
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| malformed("unparseable expiresAt"))?,
        Some(Value::Null) | None => now + default_ttl,
        Some(_) => return Err(malformed("unparseable expiresAt")),
    };

    Ok(Session {
        user: normalize_user(user_obj)?,
        token,
        expires_at,
    })
}

fn normalize_user(obj: &Map<String, Value>) -> Result<User, AuthError> {
    let id = match obj.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(malformed("user has no id")),
    };
    let email = non_empty_str(obj, "email").ok_or_else(|| malformed("user has no email"))?;
    let name = non_empty_str(obj, "name")
        .or_else(|| non_empty_str(obj, "displayName"))
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
    let avatar = non_empty_str(obj, "image")
        .or_else(|| non_empty_str(obj, "avatar"))
        .or_else(|| non_empty_str(obj, "avatarUrl"));

    Ok(User {
        id,
        email,
        name,
        avatar,
    })
}

fn non_empty_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn malformed(detail: &str) -> AuthError {
    AuthError::MalformedServerResponse(format!("Unexpected server response: {}", detail))
}
