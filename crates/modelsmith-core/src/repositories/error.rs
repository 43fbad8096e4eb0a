use thiserror::Error;

#[derive(Debug, Error)]
#[allow(clippy::enum_variant_names)]
pub enum RepositoryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Repository initialization failed: {message}")]
    InitializationError { message: String },

    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    #[error("Not authenticated")]
    Unauthenticated,

    /// The record does not exist or belongs to another user; callers cannot tell which
    #[error("{0} not found or access denied")]
    AccessDenied(&'static str),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
