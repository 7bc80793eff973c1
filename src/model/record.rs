use serde::{de::DeserializeOwned, ser::Error as _, Serialize};
use serde_json::Value;

use crate::datastore::Fields;

/// A flat record stored as one document.
///
/// The `id` lives in the document address, never in the body: it is skipped
/// when encoding and restored from the address when decoding.
pub trait Record: Serialize + DeserializeOwned + Default + Clone + Send + 'static {
    fn id(&self) -> &str;

    fn with_id(self, id: String) -> Self;

    fn to_fields(&self) -> Result<Fields, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            other => Err(serde_json::Error::custom(format!(
                "record encoded as {} instead of a map",
                other
            ))),
        }
    }
}

/// One change observed by a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEvent<T> {
    pub was_deleted: bool,
    pub record: T,
}
