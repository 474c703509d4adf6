//! JSON transport for the admin backend.
//!
//! Every request carries `Content-Type: application/json` and, when a session
//! is persisted, `Authorization: Bearer <token>` read from the session store.
//! Non-success responses are reduced to a single human-readable message taken
//! from `message`, then `error.message`, then the status text.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::storage::SessionStore;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Decode(String),
}

/// Shared API client. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
    store: Arc<dyn SessionStore>,
    session_key: String,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        store: Arc<dyn SessionStore>,
        session_key: impl Into<String>,
    ) -> Result<Self, HttpError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(format!("kilat/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            store,
            session_key: session_key.into(),
        })
    }

    pub fn from_config(config: &Config, store: Arc<dyn SessionStore>) -> Result<Self, HttpError> {
        Self::new(
            config.api.base_url.clone(),
            Duration::from_secs(config.api.timeout_secs),
            store,
            config.auth.session_key.clone(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Token of the persisted session, if any. Unparseable entries are ignored.
    fn bearer_token(&self) -> Option<String> {
        let raw = self.store.get(&self.session_key).ok().flatten()?;
        let parsed: Value = serde_json::from_str(&raw).ok()?;
        parsed
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// GET `path` with query parameters and decode the JSON body.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, HttpError> {
        let request = self.authorize(self.client.get(self.url(path)).query(query));
        let body = self.send(request).await?;
        serde_json::from_value(body).map_err(|e| HttpError::Decode(e.to_string()))
    }

    /// POST a JSON body. An empty response body decodes as `Value::Null`.
    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, HttpError> {
        let request = self.authorize(self.client.post(self.url(path)).json(body));
        self.send(request).await
    }

    /// POST with an explicit bearer token instead of the persisted one.
    pub async fn post_with_token<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        token: &str,
    ) -> Result<Value, HttpError> {
        let request = self.client.post(self.url(path)).json(body).bearer_auth(token);
        self.send(request).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, HttpError> {
        let response = request
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "API request returned error status");
            return Err(HttpError::Status {
                status: status.as_u16(),
                message: extract_error_message(status, &text),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| HttpError::Decode(e.to_string()))
    }
}

/// Pick the most specific message an error body offers.
pub fn extract_error_message(status: StatusCode, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let from_body = parsed.as_ref().and_then(|v| {
        v.get("message")
            .and_then(Value::as_str)
            .or_else(|| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
            })
            .or_else(|| v.get("error").and_then(Value::as_str))
            .map(str::to_string)
    });

    from_body.unwrap_or_else(|| match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => "An error occurred".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySessionStore;

    #[test]
    fn test_extract_top_level_message() {
        let msg = extract_error_message(
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Invalid email or password"}"#,
        );
        assert_eq!(msg, "Invalid email or password");
    }

    #[test]
    fn test_extract_nested_error_message() {
        let msg = extract_error_message(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":"bad_request","message":"Email already in use"}}"#,
        );
        assert_eq!(msg, "Email already in use");
    }

    #[test]
    fn test_extract_falls_back_to_status() {
        assert_eq!(
            extract_error_message(StatusCode::BAD_GATEWAY, "<html>oops</html>"),
            "502 Bad Gateway"
        );
        assert_eq!(
            extract_error_message(StatusCode::INTERNAL_SERVER_ERROR, ""),
            "500 Internal Server Error"
        );
    }

    #[test]
    fn test_bearer_token_from_store() {
        let store = Arc::new(MemorySessionStore::new());
        let client = ApiClient::new(
            "http://localhost:3000/api/",
            Duration::from_secs(5),
            store.clone(),
            "kilat-session",
        )
        .unwrap();

        assert_eq!(client.base_url(), "http://localhost:3000/api");
        assert_eq!(client.url("/auth/sign-out"), "http://localhost:3000/api/auth/sign-out");
        assert!(client.bearer_token().is_none());

        store.set("kilat-session", "not json").unwrap();
        assert!(client.bearer_token().is_none());

        store
            .set("kilat-session", r#"{"token":"tok-123","user":{}}"#)
            .unwrap();
        assert_eq!(client.bearer_token().as_deref(), Some("tok-123"));
    }
}
