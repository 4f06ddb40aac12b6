//! The backend's auth endpoints.
//!
//! The session manager talks to the backend through the [`AuthApi`]
//! trait. [`HttpAuthApi`] is the real implementation; tests swap in a
//! hand-written mock.
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | [`is_authenticated`](AuthApi::is_authenticated) | `GET  {api}/auth/is-auth` |
//! | [`profile`](AuthApi::profile)                    | `GET  {api}/auth/profile` |
//! | [`logout`](AuthApi::logout)                      | `POST {api}/auth/logout`  |

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ApiError, Credential, Profile};

/// Body of the `is-auth` and `profile` responses.
///
/// The profile arrives as `userData` from `is-auth` and as `user` from
/// older `profile` handlers; both are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Whether the backend considers the caller authenticated.
    #[serde(default)]
    pub success: bool,

    /// The caller's profile, when `success` is `true`.
    #[serde(default, rename = "userData", alias = "user")]
    pub user: Option<Profile>,

    /// Optional human-readable explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AuthResponse {
    /// A successful response carrying `profile`.
    pub fn authenticated(profile: Profile) -> Self {
        Self {
            success: true,
            user: Some(profile),
            message: None,
        }
    }

    /// A `success: false` response.
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// The profile, if the response is a success that carries one.
    pub fn into_profile(self) -> Option<Profile> {
        if self.success { self.user } else { None }
    }
}

/// The backend's authentication endpoints.
///
/// Implementations return [`ApiError::Rejected`] for 401/403 so the
/// session manager can tell an invalid credential from an unreachable
/// backend.
pub trait AuthApi: Send + Sync + 'static {
    /// Asks whether `credential` identifies a signed-in user.
    fn is_authenticated(
        &self,
        credential: &Credential,
    ) -> impl std::future::Future<Output = Result<AuthResponse, ApiError>> + Send;

    /// Fetches the current user's profile.
    fn profile(
        &self,
        credential: Option<&Credential>,
    ) -> impl std::future::Future<Output = Result<AuthResponse, ApiError>> + Send;

    /// Asks the backend to invalidate the server-side session.
    fn logout(
        &self,
        credential: Option<&Credential>,
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;
}

// ---------------------------------------------------------------------------
// HttpAuthApi
// ---------------------------------------------------------------------------

/// [`AuthApi`] over HTTP with `reqwest`.
///
/// The credential travels as a bearer `Authorization` header.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    http: reqwest::Client,
    api_base: String,
}

impl HttpAuthApi {
    /// Creates a client for the API rooted at `api_base`
    /// (e.g. `http://localhost:5000/api`).
    ///
    /// # Errors
    /// [`ApiError::Request`] if the HTTP client can't be built (TLS setup).
    pub fn new(
        api_base: impl Into<String>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self::with_client(http, api_base))
    }

    /// Uses an existing `reqwest` client.
    pub fn with_client(http: reqwest::Client, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_owned();
        Self { http, api_base }
    }

    /// The API root every endpoint is resolved against.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        credential: Option<&Credential>,
    ) -> Result<reqwest::Response, ApiError> {
        let request = match credential {
            Some(credential) => request.bearer_auth(credential.expose()),
            None => request,
        };
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16()));
        }
        Ok(response)
    }
}

impl AuthApi for HttpAuthApi {
    async fn is_authenticated(
        &self,
        credential: &Credential,
    ) -> Result<AuthResponse, ApiError> {
        let request = self.http.get(self.url("/auth/is-auth"));
        let response = self.send(request, Some(credential)).await?;
        Ok(response.json().await?)
    }

    async fn profile(
        &self,
        credential: Option<&Credential>,
    ) -> Result<AuthResponse, ApiError> {
        let request = self.http.get(self.url("/auth/profile"));
        let response = self.send(request, credential).await?;
        Ok(response.json().await?)
    }

    async fn logout(&self, credential: Option<&Credential>) -> Result<(), ApiError> {
        let request = self.http.post(self.url("/auth/logout"));
        self.send(request, credential).await?;
        Ok(())
    }
}
