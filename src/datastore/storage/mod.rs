mod document;
mod error;
mod memory;
mod path;
mod stream;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::config::StorageConfig;
pub use document::{ChangeKind, DocumentChange, DocumentSnapshot, Fields, Filter, Query};
pub use error::StorageError;
pub use memory::MemoryDocumentStore;
pub use path::{CollectionPath, DocumentPath};
pub use stream::{ChangeBatch, ChangeStream};

// Storage
#[async_trait]
pub trait DocumentStore: Sync + Send + 'static {
    async fn get(&self, path: &DocumentPath) -> Result<DocumentSnapshot, StorageError>;
    async fn add(
        &self,
        collection: &CollectionPath,
        fields: Fields,
    ) -> Result<DocumentPath, StorageError>;
    async fn set(&self, path: &DocumentPath, fields: Fields) -> Result<(), StorageError>;
    async fn update(
        &self,
        path: &DocumentPath,
        field: &str,
        value: Value,
    ) -> Result<(), StorageError>;
    async fn delete(&self, path: &DocumentPath) -> Result<(), StorageError>;
    async fn query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>, StorageError>;
    async fn listen(&self, query: Query) -> Result<ChangeStream, StorageError>;
}

/// Opens the store named by `config.url`. Only `memory://` is known.
pub fn open(config: &StorageConfig) -> Result<MemoryDocumentStore, StorageError> {
    let url = Url::parse(&config.url)
        .map_err(|err| StorageError::InvalidUrl(config.url.clone(), err.to_string()))?;
    match url.scheme() {
        "memory" => Ok(MemoryDocumentStore::with_capacity(
            config.change_capacity(),
            config.listener_buffer(),
        )),
        scheme => Err(StorageError::UnsupportedBackend(scheme.to_string())),
    }
}
