//! Client for the hosted auth service.
//!
//! Exchanges credentials for a [`Session`] (`/auth/v1/token`), registers new
//! accounts (`/auth/v1/signup`), refreshes and revokes sessions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use flowline_core::{Session, SessionUser};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::rest::RestClient;

/// Email/password pair submitted by the sign-in and sign-up forms.
#[derive(Clone, Serialize, Validate)]
pub struct Credentials {
    #[validate(email)]
    pub email: String,
    /// The auth service rejects passwords shorter than six characters.
    #[validate(length(min = 6))]
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Token grant returned by sign-in, refresh and (when confirmation is
/// disabled) sign-up.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Lifetime in seconds.
    expires_in: i64,
    /// Absolute expiry as a Unix timestamp, when the service reports it.
    #[serde(default)]
    expires_at: Option<i64>,
    user: SessionUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(self.expires_in));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user: self.user,
            expires_at,
        }
    }
}

/// HTTP client for the auth endpoints of one hosted project.
#[derive(Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AuthClient {
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(
            client,
            config.project_url.clone(),
            config.anon_key.clone(),
        ))
    }

    pub fn with_client(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Sign in with email and password.
    pub async fn sign_in_with_password(&self, credentials: &Credentials) -> RemoteResult<Session> {
        credentials.validate()?;

        let response = self
            .client
            .post(self.url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(credentials)
            .send()
            .await?;

        let grant: TokenResponse = Self::parse_response(response).await?;
        let session = grant.into_session();
        tracing::info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    /// Register a new account.
    ///
    /// Returns `None` when the project requires email confirmation before the
    /// first sign-in; the caller should send the user to the login screen.
    pub async fn sign_up(&self, credentials: &Credentials) -> RemoteResult<Option<Session>> {
        credentials.validate()?;

        let response = self
            .client
            .post(self.url("signup"))
            .header("apikey", &self.api_key)
            .json(credentials)
            .send()
            .await?;

        let body: serde_json::Value = Self::parse_response(response).await?;
        if body.get("access_token").is_none() {
            tracing::info!(email = %credentials.email, "Signed up, confirmation pending");
            return Ok(None);
        }
        let grant: TokenResponse = serde_json::from_value(body)
            .map_err(|e| RemoteError::UnexpectedResponse(e.to_string()))?;
        Ok(Some(grant.into_session()))
    }

    /// Trade the session's refresh token for a fresh session.
    pub async fn refresh(&self, session: &Session) -> RemoteResult<Session> {
        let refresh_token = session
            .refresh_token
            .as_deref()
            .ok_or(RemoteError::Unauthenticated)?;

        let response = self
            .client
            .post(self.url("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let grant: TokenResponse = Self::parse_response(response).await?;
        Ok(grant.into_session())
    }

    /// Revoke the session server-side.
    pub async fn sign_out(&self, session: &Session) -> RemoteResult<()> {
        let response = self
            .client
            .post(self.url("logout"))
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, session.bearer())
            .send()
            .await?;

        RestClient::ensure_success(response).await?;
        tracing::info!(user_id = %session.user.id, "Signed out");
        Ok(())
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> RemoteResult<T> {
        let grant = RestClient::ensure_success(response).await?.json::<T>().await?;
        Ok(grant)
    }
}
