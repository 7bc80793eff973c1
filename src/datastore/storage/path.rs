//! Typed addresses for collections and documents.
//!
//! A collection path always has an odd number of segments (`Course`,
//! `Course/c1/Task`), a document path an even one (`Course/c1`).

use std::fmt;

use super::error::StorageError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

fn check_segment(segment: &str) -> Result<(), StorageError> {
    if segment.is_empty() || segment.contains('/') {
        return Err(StorageError::InvalidPath(segment.to_string()));
    }
    Ok(())
}

impl CollectionPath {
    /// Top-level collection.
    pub fn root(name: &str) -> Result<Self, StorageError> {
        check_segment(name)?;
        Ok(CollectionPath(name.to_string()))
    }

    /// Address of the document `id` inside this collection.
    pub fn doc(&self, id: &str) -> Result<DocumentPath, StorageError> {
        check_segment(id)?;
        Ok(DocumentPath {
            collection: self.clone(),
            id: id.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl DocumentPath {
    /// Sub-collection nested under this document.
    pub fn collection(&self, name: &str) -> Result<CollectionPath, StorageError> {
        check_segment(name)?;
        Ok(CollectionPath(format!("{}/{}", self, name)))
    }

    pub fn parent(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}
