use flowline_remote::RemoteError;

/// Errors returned by controller operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No live session. The caller should send the user to sign in.
    #[error("Sign-in required")]
    AuthRequired,

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl ClientError {
    /// True when the failure means the user must sign in again.
    pub fn requires_sign_in(&self) -> bool {
        match self {
            ClientError::AuthRequired => true,
            ClientError::Remote(e) => e.is_authorization(),
            ClientError::Validation(_) => false,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
