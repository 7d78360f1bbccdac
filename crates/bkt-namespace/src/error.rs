use bkt_store::StoreError;

/// Errors produced by the namespace cache.
#[derive(Debug, thiserror::Error)]
pub enum NamespaceError {
    /// A listing page failed mid-build; the partial tree was discarded.
    #[error("bucket listing failed after {pages} page(s): {source}")]
    Build {
        pages: usize,
        #[source]
        source: StoreError,
    },

    /// The path is absent from the current snapshot.
    #[error("path not found: {0}")]
    NotFound(String),

    /// No build has ever succeeded, so there is nothing to serve.
    #[error("no namespace snapshot available: {last_error}")]
    NoSnapshot { last_error: String },

    /// The detached rebuild task panicked or was cancelled.
    #[error("namespace rebuild task failed: {0}")]
    RebuildTask(String),
}

/// Result alias for namespace operations.
pub type NamespaceResult<T> = Result<T, NamespaceError>;
