// models/src/errors.rs

pub use thiserror::Error;

/// Domain error for the hospital management backend.
///
/// The first five variants carry caller-facing messages and map directly to
/// HTTP statuses at the API boundary; the remaining variants are internal
/// failures surfaced as 500s.
#[derive(Debug, Error)]
pub enum HmsError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("An internal error occurred: {0}")]
    Internal(String),

    #[cfg(feature = "sled-errors")]
    #[error(transparent)]
    Sled(#[from] sled::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

pub type HmsResult<T> = Result<T, HmsError>;

impl HmsError {
    pub fn validation(msg: impl Into<String>) -> Self {
        HmsError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        HmsError::Conflict(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        HmsError::Auth(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        HmsError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        HmsError::NotFound(msg.into())
    }
}
