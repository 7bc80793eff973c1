use thiserror::*;

use super::storage::StorageError;

#[derive(Debug, Error)]
pub enum DataStoreError {
    #[error("storage returned error: {0}")]
    Storage(#[from] StorageError),

    #[error("unable to encode record: {0}")]
    Encode(serde_json::Error),

    #[error("unable to decode document {path}: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },
}
