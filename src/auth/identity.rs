//! Remote identity service seam.
//!
//! [`HttpIdentityService`] talks to the backend's `/auth/*` endpoints.
//! [`MockIdentityService`] answers locally and backs mock mode.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Value};

use super::AuthError;
use crate::http::{ApiClient, HttpError};

/// Raw sign-in/sign-up payloads are returned unnormalized; the session
/// manager decides how to read them.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Value, AuthError>;
    async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<Value, AuthError>;
    async fn sign_out(&self, token: &str) -> Result<(), AuthError>;
}

#[derive(Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

pub struct HttpIdentityService {
    api: ApiClient,
}

impl HttpIdentityService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl IdentityService for HttpIdentityService {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Value, AuthError> {
        self.api
            .post("/auth/sign-in/email", &SignInRequest { email, password })
            .await
            .map_err(auth_error_from_http)
    }

    async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<Value, AuthError> {
        self.api
            .post(
                "/auth/sign-up/email",
                &SignUpRequest {
                    name,
                    email,
                    password,
                },
            )
            .await
            .map_err(auth_error_from_http)
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        self.api
            .post_with_token("/auth/sign-out", &json!({}), token)
            .await
            .map(|_| ())
            .map_err(auth_error_from_http)
    }
}

/// Client errors on auth endpoints mean the credentials (or sign-up data)
/// were rejected; everything else is a failure to reach a working service.
pub fn auth_error_from_http(err: HttpError) -> AuthError {
    match err {
        HttpError::Status { status, message } if matches!(status, 400 | 401 | 403 | 409 | 422) => {
            AuthError::InvalidCredentials(message)
        }
        HttpError::Status { message, .. } => AuthError::NetworkFailure(message),
        HttpError::Transport(message) => AuthError::NetworkFailure(message),
        HttpError::Decode(message) => {
            AuthError::MalformedServerResponse(format!("Unexpected server response: {}", message))
        }
    }
}

pub const MOCK_ADMIN_EMAIL: &str = "admin@kilat.com";
pub const MOCK_ADMIN_PASSWORD: &str = "password";

#[derive(Debug, Clone)]
struct MockAccount {
    id: String,
    name: String,
    password: String,
}

/// In-process identity service with a seeded admin account.
#[derive(Debug)]
pub struct MockIdentityService {
    accounts: DashMap<String, MockAccount>,
    latency: std::time::Duration,
}

impl Default for MockIdentityService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentityService {
    pub fn new() -> Self {
        let accounts = DashMap::new();
        accounts.insert(
            MOCK_ADMIN_EMAIL.to_string(),
            MockAccount {
                id: "1".to_string(),
                name: "Admin User".to_string(),
                password: MOCK_ADMIN_PASSWORD.to_string(),
            },
        );
        Self {
            accounts,
            latency: std::time::Duration::ZERO,
        }
    }

    /// Delay every call, to make loading states observable.
    pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn session_payload(email: &str, account: &MockAccount) -> Value {
        let now = Utc::now();
        json!({
            "user": {
                "id": account.id,
                "email": email,
                "name": account.name,
                "image": avatar_url(&account.name),
            },
            "session": {
                "token": format!("mock-jwt-token-{}", now.timestamp_millis()),
                "expiresAt": (now + Duration::hours(24)).to_rfc3339(),
            }
        })
    }
}

fn avatar_url(name: &str) -> String {
    let encoded: Vec<String> = name
        .split_whitespace()
        .map(|part| urlencoding::encode(part).into_owned())
        .collect();
    format!(
        "https://ui-avatars.com/api/?name={}&background=3b82f6&color=fff",
        encoded.join("+")
    )
}

#[async_trait]
impl IdentityService for MockIdentityService {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Value, AuthError> {
        self.simulate_latency().await;

        match self.accounts.get(email) {
            Some(account) if account.password == password => {
                Ok(Self::session_payload(email, &account))
            }
            _ => Err(AuthError::InvalidCredentials(
                "Invalid email or password".to_string(),
            )),
        }
    }

    async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<Value, AuthError> {
        self.simulate_latency().await;

        if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "Name, email and password are required".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(AuthError::InvalidCredentials(
                "Invalid email address".to_string(),
            ));
        }

        let account = match self.accounts.entry(email.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(AuthError::InvalidCredentials(
                    "An account with this email already exists".to_string(),
                ));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => slot
                .insert(MockAccount {
                    id: uuid::Uuid::new_v4().to_string(),
                    name: name.trim().to_string(),
                    password: password.to_string(),
                })
                .clone(),
        };

        Ok(Self::session_payload(email, &account))
    }

    async fn sign_out(&self, _token: &str) -> Result<(), AuthError> {
        self.simulate_latency().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_admin_sign_in() {
        let service = MockIdentityService::new();
        let payload = service
            .sign_in(MOCK_ADMIN_EMAIL, MOCK_ADMIN_PASSWORD)
            .await
            .unwrap();

        assert_eq!(payload["user"]["name"], "Admin User");
        assert_eq!(payload["user"]["id"], "1");
        assert!(payload["session"]["token"]
            .as_str()
            .unwrap()
            .starts_with("mock-jwt-token-"));
        assert_eq!(
            payload["user"]["image"],
            "https://ui-avatars.com/api/?name=Admin+User&background=3b82f6&color=fff"
        );
    }

    #[tokio::test]
    async fn test_mock_rejects_bad_password() {
        let service = MockIdentityService::new();
        let err = service.sign_in(MOCK_ADMIN_EMAIL, "nope").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
        assert_eq!(err.to_string(), "Invalid email or password");
    }

    #[tokio::test]
    async fn test_mock_sign_up_then_sign_in() {
        let service = MockIdentityService::new();
        service
            .sign_up("New Editor", "editor@kilat.com", "s3cret")
            .await
            .unwrap();

        let payload = service.sign_in("editor@kilat.com", "s3cret").await.unwrap();
        assert_eq!(payload["user"]["name"], "New Editor");

        let dup = service.sign_up("Again", "editor@kilat.com", "x").await;
        assert!(matches!(dup, Err(AuthError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn test_mock_sign_up_validation() {
        let service = MockIdentityService::new();
        assert!(service.sign_up("", "a@b.c", "pw").await.is_err());
        assert!(service.sign_up("Name", "not-an-email", "pw").await.is_err());
    }

    #[test]
    fn test_http_error_mapping() {
        let rejected = auth_error_from_http(HttpError::Status {
            status: 401,
            message: "Invalid email or password".to_string(),
        });
        assert!(matches!(rejected, AuthError::InvalidCredentials(_)));

        let server_down = auth_error_from_http(HttpError::Status {
            status: 503,
            message: "503 Service Unavailable".to_string(),
        });
        assert!(matches!(server_down, AuthError::NetworkFailure(_)));

        let transport = auth_error_from_http(HttpError::Transport("connection refused".into()));
        assert!(matches!(transport, AuthError::NetworkFailure(_)));

        let decode = auth_error_from_http(HttpError::Decode("expected value".into()));
        assert!(matches!(decode, AuthError::MalformedServerResponse(_)));
    }
}
