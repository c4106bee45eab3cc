#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unknown {kind}: {value:?}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Invalid session token: {0}")]
    InvalidToken(String),
}
