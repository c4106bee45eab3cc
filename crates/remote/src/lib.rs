//! Remote data access for the Flowline client.
//!
//! - [`RemoteCollection`] is the contract the optimistic controller consumes:
//!   select-all, partial update, insert, bulk insert and delete, each scoped
//!   to an explicit [`Session`](flowline_core::Session).
//! - [`RestClient`] implements it against the hosted row API over HTTP.
//! - [`AuthClient`] signs users in and out and produces sessions.
//! - [`RemoteConfig`] loads the project URL and key from the environment.

pub mod auth;
pub mod collection;
pub mod config;
pub mod error;
pub mod rest;

pub use auth::{AuthClient, Credentials};
pub use collection::RemoteCollection;
pub use config::{ConfigError, RemoteConfig};
pub use error::{RemoteError, RemoteResult};
pub use rest::RestClient;
