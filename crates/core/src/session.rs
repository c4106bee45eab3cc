//! Authenticated session model.
//!
//! A [`Session`] is the single explicit credential passed to every remote
//! operation. It carries the bearer token issued by the hosted auth service
//! together with the user it was issued for and its expiry.
//!
//! Tokens are HS256 JWTs signed by the auth service. The client cannot verify
//! the signature (it never sees the secret); it only reads the `sub`, `email`
//! and `exp` claims so it can tell who is signed in and when to stop using the
//! token. The row API verifies the signature on every request.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{Timestamp, UserId};

/// The account a session was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Claims read from the access token.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: UserId,
    #[serde(default)]
    email: Option<String>,
    exp: i64,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: SessionUser,
    pub expires_at: Timestamp,
}

impl Session {
    /// Build a session from a bearer token by reading its claims.
    pub fn from_access_token(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> Result<Self, CoreError> {
        let access_token = access_token.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;

        let data = decode::<TokenClaims>(&access_token, &DecodingKey::from_secret(&[]), &validation)
            .map_err(|e| CoreError::InvalidToken(e.to_string()))?;

        let expires_at = DateTime::<Utc>::from_timestamp(data.claims.exp, 0)
            .ok_or_else(|| CoreError::InvalidToken(format!("exp out of range: {}", data.claims.exp)))?;

        Ok(Self {
            access_token,
            refresh_token,
            user: SessionUser {
                id: data.claims.sub,
                email: data.claims.email,
            },
            expires_at,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
