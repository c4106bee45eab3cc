//! HTTP client for the hosted row API.
//!
//! Rows live under `{project_url}/rest/v1/{collection}`. Every request
//! carries the project's `apikey` header and the session's bearer token;
//! the service applies row-level ownership rules based on that token.

use std::time::Duration;

use async_trait::async_trait;
use flowline_core::{Collection, Record, Session};
use reqwest::header::AUTHORIZATION;
use reqwest::RequestBuilder;

use crate::collection::RemoteCollection;
use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};

/// Asks the service to echo affected rows back in the response body.
const RETURN_REPRESENTATION: &str = "return=representation";

/// HTTP client for the row API of one hosted project.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestClient {
    /// Build a client with its own connection pool and the configured timeout.
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

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn table_url(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection.as_str())
    }

    /// Attach credentials, refusing to build the request without a live session.
    fn authorized(&self, builder: RequestBuilder, session: &Session) -> RemoteResult<RequestBuilder> {
        if session.is_expired() {
            return Err(RemoteError::Unauthenticated);
        }
        Ok(builder
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, session.bearer()))
    }

    /// Turn a non-2xx reply into [`RemoteError::Api`], keeping the error
    /// body the project returned so callers can log it. Shared with
    /// [`AuthClient`](crate::AuthClient), which talks to the same gateway.
    pub(crate) async fn ensure_success(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = match response.text().await {
            Ok(text) => text,
            Err(e) => format!("<body unavailable: {e}>"),
        };
        Err(RemoteError::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// Decode the rows (or row) the API echoed back.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> RemoteResult<T> {
        let rows = Self::ensure_success(response).await?.json::<T>().await?;
        Ok(rows)
    }

    /// Number of rows echoed back by a `return=representation` request.
    async fn affected_rows(response: reqwest::Response) -> RemoteResult<usize> {
        let rows: Vec<serde_json::Value> = Self::parse_response(response).await?;
        Ok(rows.len())
    }
}

#[async_trait]
impl<R: Record> RemoteCollection<R> for RestClient {
    async fn select_all(&self, session: &Session) -> RemoteResult<Vec<R>> {
        let request = self.authorized(
            self.client
                .get(self.table_url(R::COLLECTION))
                .query(&[("select", "*"), ("order", "created_at.desc")]),
            session,
        )?;

        let rows: Vec<R> = Self::parse_response(request.send().await?).await?;
        tracing::debug!(collection = %R::COLLECTION, count = rows.len(), "Fetched collection");
        Ok(rows)
    }

    async fn update(&self, session: &Session, id: &str, patch: &R::Patch) -> RemoteResult<()> {
        let request = self.authorized(
            self.client
                .patch(self.table_url(R::COLLECTION))
                .query(&[("id", format!("eq.{id}"))])
                .header("Prefer", RETURN_REPRESENTATION)
                .json(patch),
            session,
        )?;

        if Self::affected_rows(request.send().await?).await? == 0 {
            return Err(RemoteError::NotFound {
                entity: R::COLLECTION.entity(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert(&self, session: &Session, row: &R::Insert) -> RemoteResult<R> {
        let request = self.authorized(
            self.client
                .post(self.table_url(R::COLLECTION))
                .header("Prefer", RETURN_REPRESENTATION)
                .json(row),
            session,
        )?;

        let rows: Vec<R> = Self::parse_response(request.send().await?).await?;
        rows.into_iter().next().ok_or_else(|| {
            RemoteError::UnexpectedResponse(format!(
                "insert into {} returned no row",
                R::COLLECTION
            ))
        })
    }

    async fn insert_many(&self, session: &Session, rows: &[R::Insert]) -> RemoteResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let request = self.authorized(
            self.client
                .post(self.table_url(R::COLLECTION))
                .header("Prefer", RETURN_REPRESENTATION)
                .json(rows),
            session,
        )?;

        Self::affected_rows(request.send().await?).await
    }

    async fn delete(&self, session: &Session, id: &str) -> RemoteResult<()> {
        let request = self.authorized(
            self.client
                .delete(self.table_url(R::COLLECTION))
                .query(&[("id", format!("eq.{id}"))])
                .header("Prefer", RETURN_REPRESENTATION),
            session,
        )?;

        if Self::affected_rows(request.send().await?).await? == 0 {
            return Err(RemoteError::NotFound {
                entity: R::COLLECTION.entity(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
