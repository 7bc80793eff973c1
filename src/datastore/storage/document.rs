use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::path::{CollectionPath, DocumentPath};

/// Document body, keyed by field name.
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub path: DocumentPath,
    /// `None` when the document does not exist.
    pub fields: Option<Fields>,
}

impl DocumentSnapshot {
    pub fn new(path: DocumentPath, fields: Option<Fields>) -> Self {
        Self { path, fields }
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }

    pub fn exists(&self) -> bool {
        self.fields.is_some()
    }

    /// Decodes the body by field name. A missing document decodes to `None`.
    pub fn to_record<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        match &self.fields {
            Some(fields) => serde_json::from_value(Value::Object(fields.clone())).map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    /// For `Removed` this holds the last known body.
    pub document: DocumentSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

/// Documents of one collection matching every equality filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: CollectionPath,
    pub filters: Vec<Filter>,
}

impl Query {
    pub fn new(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: vec![],
        }
    }

    pub fn where_equal_to(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn matches(&self, path: &DocumentPath, fields: &Fields) -> bool {
        path.parent() == &self.collection
            && self
                .filters
                .iter()
                .all(|filter| fields.get(&filter.field) == Some(&filter.value))
    }
}
