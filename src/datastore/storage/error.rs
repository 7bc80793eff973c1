use thiserror::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("the store is unavailable: {0}")]
    Unavailable(String),

    #[error("the document not found {0}")]
    NotFound(String),

    #[error("invalid path segment '{0}'")]
    InvalidPath(String),

    #[error("listener lagged behind the change feed, {0} changes skipped")]
    Lagged(u64),

    #[error("unsupported storage backend '{0}'")]
    UnsupportedBackend(String),

    #[error("invalid storage url '{0}': {1}")]
    InvalidUrl(String, String),
}
