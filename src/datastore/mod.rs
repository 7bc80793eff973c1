mod error;
pub mod schema;
mod service;
mod storage;
mod subscription;

pub use error::DataStoreError;
pub use service::{StorageService, StorageServiceImpl};
pub use storage::{
    open, ChangeBatch, ChangeKind, ChangeStream, CollectionPath, DocumentChange, DocumentPath,
    DocumentSnapshot, DocumentStore, Fields, Filter, MemoryDocumentStore, Query, StorageError,
};
pub use subscription::Subscription;
