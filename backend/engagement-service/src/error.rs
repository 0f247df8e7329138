/// Error types for engagement-service
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] anyhow::Error),

    #[error("Already liked")]
    AlreadyLiked,

    #[error("Not liked")]
    NotLiked,

    #[error("Cascading delete failed after planning {planned} node deletions: {source}")]
    PartialCascade { planned: usize, source: anyhow::Error },

    #[error("Subtree traversal exceeded {what} limit of {limit}")]
    TraversalLimit { what: &'static str, limit: usize },

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
