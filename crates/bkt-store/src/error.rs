/// Errors from object store operations.
///
/// Callers only ever branch on [`StoreError::NotFound`]; every other variant
/// is an opaque cause passed through to logs and error responses.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested key does not exist in the bucket.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Failure reported by the storage backend (network, auth, throttling).
    #[error("backend error: {0}")]
    Backend(String),

    /// The call did not complete within its deadline.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Injected or backend-side refusal to mutate the bucket.
    #[error("store is read-only")]
    ReadOnly,

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Wrap any displayable backend failure.
    pub fn backend(cause: impl std::fmt::Display) -> Self {
        Self::Backend(cause.to_string())
    }

    /// Returns `true` for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
