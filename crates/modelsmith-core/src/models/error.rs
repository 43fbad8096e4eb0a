use thiserror::Error;

/// Rejected mutations of the in-memory project state. State is untouched when returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Cannot delete the last remaining project")]
    LastProject,

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
}

pub type StoreResult<T> = Result<T, StoreError>;
