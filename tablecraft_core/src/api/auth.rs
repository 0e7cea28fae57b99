use crate::error::Result;
use crate::http::{ApiRequest, HttpClient, Service};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthTokens {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Endpoints under /auth on the auth service
#[derive(Debug, Clone)]
pub struct AuthApi {
    http: HttpClient,
}

impl AuthApi {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Exchange credentials for a token and persist it
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthTokens> {
        let request = ApiRequest::post(
            Service::Auth,
            "/auth/login",
            json!({ "email": email, "password": password }),
        );
        let tokens: AuthTokens = self.http.request(&request).await?;
        self.http.tokens().set(tokens.access_token.clone())?;
        info!(email = %email, "Logged in");
        Ok(tokens)
    }

    pub async fn register(&self, registration: &Registration) -> Result<User> {
        let request = ApiRequest::post(
            Service::Auth,
            "/auth/register",
            serde_json::to_value(registration)?,
        );
        self.http.request(&request).await
    }

    /// Invalidate the server session. The local token is dropped either way.
    pub async fn logout(&self) -> Result<()> {
        let request = ApiRequest::post(Service::Auth, "/auth/logout", json!({}));
        let outcome = self.http.request_json(&request).await;
        if let Err(e) = &outcome {
            warn!(error = %e, "Server logout failed, clearing local token anyway");
        }
        self.http.tokens().clear()?;
        outcome.map(|_| ())
    }

    pub async fn me(&self) -> Result<User> {
        self.http
            .request(&ApiRequest::get(Service::Auth, "/auth/me"))
            .await
    }

    pub async fn update_me(&self, update: &UserUpdate) -> Result<User> {
        let request = ApiRequest::patch(Service::Auth, "/auth/me", serde_json::to_value(update)?);
        self.http.request(&request).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let request = ApiRequest::post(
            Service::Auth,
            "/auth/forgot-password",
            json!({ "email": email }),
        );
        self.http.request_json(&request).await.map(|_| ())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        let request = ApiRequest::post(
            Service::Auth,
            "/auth/reset-password",
            json!({ "token": token, "new_password": new_password }),
        );
        self.http.request_json(&request).await.map(|_| ())
    }
}
