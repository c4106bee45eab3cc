//! The remote collection contract.

use async_trait::async_trait;
use flowline_core::{Record, Session};

use crate::error::RemoteResult;

/// CRUD access to one server-scoped collection of `R`.
///
/// Every operation is authorization-scoped to `session`; rows owned by other
/// accounts are never visible. Implementations must fail with
/// [`RemoteError::Unauthenticated`](crate::RemoteError::Unauthenticated)
/// before touching the network when the session has expired.
#[async_trait]
pub trait RemoteCollection<R: Record>: Send + Sync {
    /// Fetch every row visible to the caller, newest first.
    async fn select_all(&self, session: &Session) -> RemoteResult<Vec<R>>;

    /// Partial update by id.
    async fn update(&self, session: &Session, id: &str, patch: &R::Patch) -> RemoteResult<()>;

    /// Insert one row, returning it as stored (server-assigned id included).
    async fn insert(&self, session: &Session, row: &R::Insert) -> RemoteResult<R>;

    /// Insert many rows in one request, returning how many were stored.
    async fn insert_many(&self, session: &Session, rows: &[R::Insert]) -> RemoteResult<usize>;

    async fn delete(&self, session: &Session, id: &str) -> RemoteResult<()>;
}
