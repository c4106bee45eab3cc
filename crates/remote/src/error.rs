use flowline_core::RecordId;

/// Errors from the remote data-access layer.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// No usable session; raised before any request is built.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Request input failed boundary validation; nothing was sent.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] validator::ValidationErrors),

    /// The HTTP request itself failed (network, DNS, TLS, timeout, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Remote API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// An update or delete matched no row visible to the caller.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: RecordId },

    /// A 2xx response whose body did not have the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl RemoteError {
    /// Whether the failure means the session is missing or rejected.
    pub fn is_authorization(&self) -> bool {
        match self {
            RemoteError::Unauthenticated => true,
            RemoteError::Api { status, .. } => matches!(status, 401 | 403),
            _ => false,
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;
