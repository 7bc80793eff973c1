use std::collections::VecDeque;
use std::marker::PhantomData;

use super::error::DataStoreError;
use super::storage::{ChangeKind, ChangeStream, DocumentChange};
use crate::model::{Record, RecordEvent};

/// Caller-owned handle on a live query.
///
/// Yields one event per changed document. Faults reported by the store come
/// through as `Err` items and do not end the subscription. Dropping the
/// handle cancels it.
pub struct Subscription<T> {
    stream: ChangeStream,
    pending: VecDeque<DocumentChange>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Subscription<T> {
    pub(crate) fn new(stream: ChangeStream) -> Self {
        Self {
            stream,
            pending: VecDeque::new(),
            _record: PhantomData,
        }
    }

    /// Next event, or `None` once the store has closed the stream.
    pub async fn next(&mut self) -> Option<Result<RecordEvent<T>, DataStoreError>> {
        loop {
            if let Some(change) = self.pending.pop_front() {
                return Some(decode_change(change));
            }
            match self.stream.next().await? {
                Ok(batch) => self.pending.extend(batch),
                Err(err) => return Some(Err(err.into())),
            }
        }
    }

    pub fn remove(self) {
        self.stream.cancel();
    }
}

fn decode_change<T: Record>(change: DocumentChange) -> Result<RecordEvent<T>, DataStoreError> {
    let document = change.document;
    let record = document
        .to_record::<T>()
        .map_err(|source| DataStoreError::Decode {
            path: document.path.to_string(),
            source,
        })?
        .unwrap_or_default()
        .with_id(document.id().to_string());
    Ok(RecordEvent {
        was_deleted: change.kind == ChangeKind::Removed,
        record,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::timeout;

    use super::*;
    use crate::datastore::storage::{DocumentStore, MemoryDocumentStore, Query};
    use crate::datastore::schema;
    use crate::model::Task;

    #[tokio::test]
    async fn test_undecodable_document_is_reported() {
        // GIVEN
        let storage = MemoryDocumentStore::new();
        let query = Query::new(schema::tasks("c1").unwrap());
        let mut subscription = Subscription::<Task>::new(storage.listen(query).await.unwrap());

        // WHEN
        let body = match json!({"userId": "u1", "flag": "yes"}) {
            serde_json::Value::Object(fields) => fields,
            _ => unreachable!(),
        };
        storage
            .set(&schema::task("c1", "t1").unwrap(), body)
            .await
            .unwrap();

        // THEN the empty initial batch is skipped and the bad document surfaces as an error
        let event = timeout(Duration::from_secs(1), subscription.next())
            .await
            .unwrap()
            .unwrap();
        match event {
            Err(DataStoreError::Decode { path, .. }) => assert_eq!(path, "Course/c1/Task/t1"),
            other => panic!("unexpected event {:?}", other),
        }

        // WHEN a valid task follows
        let task = Task::new("u1", "Read chapter 3");
        storage
            .set(
                &schema::task("c1", "t2").unwrap(),
                task.to_fields().unwrap(),
            )
            .await
            .unwrap();

        // THEN the subscription still delivers it
        let event = timeout(Duration::from_secs(1), subscription.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(!event.was_deleted);
        assert_eq!(event.record, task.with_id("t2".into()));
    }
}
