use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::{debug, debug_span, warn, Instrument};
use uuid::Uuid;

use super::document::{ChangeKind, DocumentChange, DocumentSnapshot, Fields, Query};
use super::error::StorageError;
use super::path::{CollectionPath, DocumentPath};
use super::stream::{ChangeBatch, ChangeStream};
use super::DocumentStore;
use crate::config::{CHANGE_CAPACITY, CHANNEL_SIZE};

#[derive(Debug, Clone)]
struct StoreChange {
    path: DocumentPath,
    current: Option<Fields>,
}

// Listeners hold this weakly so they can resync after lagging.
struct Shared {
    documents: Mutex<BTreeMap<DocumentPath, Fields>>,
    changes: broadcast::Sender<StoreChange>,
}

impl Shared {
    fn matching(&self, query: &Query) -> Vec<DocumentSnapshot> {
        select(&self.documents.lock(), query)
    }

    /// Current matches plus a feed starting right after them.
    fn snapshot(
        &self,
        query: &Query,
    ) -> (Vec<DocumentSnapshot>, broadcast::Receiver<StoreChange>) {
        let documents = self.documents.lock();
        (select(&documents, query), self.changes.subscribe())
    }

    fn write(&self, path: DocumentPath, current: Option<Fields>) {
        let mut documents = self.documents.lock();
        let previous = match &current {
            Some(fields) => documents.insert(path.clone(), fields.clone()),
            None => documents.remove(&path),
        };
        if previous.is_none() && current.is_none() {
            return;
        }
        // sent under the lock so listeners see writes in order; no listeners is fine
        let _ = self.changes.send(StoreChange { path, current });
    }
}

fn select(documents: &BTreeMap<DocumentPath, Fields>, query: &Query) -> Vec<DocumentSnapshot> {
    documents
        .iter()
        .filter(|(path, fields)| query.matches(path, fields))
        .map(|(path, fields)| DocumentSnapshot::new(path.clone(), Some(fields.clone())))
        .collect()
}

pub struct MemoryDocumentStore {
    shared: Arc<Shared>,
    offline: AtomicBool,
    listener_buffer: usize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_capacity(CHANGE_CAPACITY, CHANNEL_SIZE)
    }

    pub fn with_capacity(change_capacity: usize, listener_buffer: usize) -> Self {
        let (changes, _) = broadcast::channel(change_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                documents: Mutex::new(BTreeMap::new()),
                changes,
            }),
            offline: AtomicBool::new(false),
            listener_buffer: listener_buffer.max(1),
        }
    }

    /// While offline every request fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.shared.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::Acquire) {
            return Err(StorageError::Unavailable("store is offline".into()));
        }
        Ok(())
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<DocumentSnapshot, StorageError> {
        self.check_online()?;
        let fields = self.shared.documents.lock().get(path).cloned();
        Ok(DocumentSnapshot::new(path.clone(), fields))
    }

    async fn add(
        &self,
        collection: &CollectionPath,
        fields: Fields,
    ) -> Result<DocumentPath, StorageError> {
        self.check_online()?;
        let path = collection.doc(&Uuid::new_v4().simple().to_string())?;
        self.shared.write(path.clone(), Some(fields));
        debug!(path = %path, "document added");
        Ok(path)
    }

    async fn set(&self, path: &DocumentPath, fields: Fields) -> Result<(), StorageError> {
        self.check_online()?;
        self.shared.write(path.clone(), Some(fields));
        Ok(())
    }

    async fn update(
        &self,
        path: &DocumentPath,
        field: &str,
        value: Value,
    ) -> Result<(), StorageError> {
        self.check_online()?;
        let mut documents = self.shared.documents.lock();
        let fields = documents
            .get_mut(path)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
        fields.insert(field.to_string(), value);
        let current = Some(fields.clone());
        let _ = self.shared.changes.send(StoreChange {
            path: path.clone(),
            current,
        });
        Ok(())
    }

    async fn delete(&self, path: &DocumentPath) -> Result<(), StorageError> {
        self.check_online()?;
        self.shared.write(path.clone(), None);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>, StorageError> {
        self.check_online()?;
        Ok(self.shared.matching(query))
    }

    async fn listen(&self, query: Query) -> Result<ChangeStream, StorageError> {
        self.check_online()?;
        let (initial, feed) = self.shared.snapshot(&query);
        let (tx, rx) = mpsc::channel(self.listener_buffer);
        let span = debug_span!("listener", collection = %query.collection);
        let listener = Listener {
            query,
            shared: Arc::downgrade(&self.shared),
            visible: HashMap::new(),
            tx,
        };
        let handle = tokio::spawn(listener.run(initial, feed).instrument(span));
        Ok(ChangeStream::new(rx, Some(handle)))
    }
}

struct Listener {
    query: Query,
    shared: Weak<Shared>,
    /// Last delivered body of every document currently in the result set.
    visible: HashMap<DocumentPath, Fields>,
    tx: mpsc::Sender<ChangeBatch>,
}

impl Listener {
    async fn run(
        mut self,
        initial: Vec<DocumentSnapshot>,
        mut feed: broadcast::Receiver<StoreChange>,
    ) {
        let batch = self.resync(initial);
        if self.tx.send(Ok(batch)).await.is_err() {
            return;
        }

        loop {
            let change = match feed.recv().await {
                Ok(change) => change,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "listener lagged behind the change feed, resyncing");
                    if self.tx.send(Err(StorageError::Lagged(skipped))).await.is_err() {
                        return;
                    }
                    let shared = match self.shared.upgrade() {
                        Some(shared) => shared,
                        None => return,
                    };
                    let (current, fresh) = shared.snapshot(&self.query);
                    drop(shared);
                    feed = fresh;
                    let batch = self.resync(current);
                    if !batch.is_empty() && self.tx.send(Ok(batch)).await.is_err() {
                        return;
                    }
                    continue;
                }
                Err(RecvError::Closed) => return,
            };
            if let Some(change) = self.classify(change) {
                if self.tx.send(Ok(vec![change])).await.is_err() {
                    debug!("listener dropped");
                    return;
                }
            }
        }
    }

    /// Diffs a full result set against what was delivered so far.
    fn resync(&mut self, current: Vec<DocumentSnapshot>) -> Vec<DocumentChange> {
        let mut stale = std::mem::take(&mut self.visible);
        let mut changes = vec![];
        for document in current {
            let fields = match &document.fields {
                Some(fields) => fields.clone(),
                None => continue,
            };
            let kind = match stale.remove(&document.path) {
                None => Some(ChangeKind::Added),
                Some(previous) if previous != fields => Some(ChangeKind::Modified),
                Some(_) => None,
            };
            self.visible.insert(document.path.clone(), fields);
            if let Some(kind) = kind {
                changes.push(DocumentChange { kind, document });
            }
        }
        for (path, fields) in stale {
            changes.push(DocumentChange {
                kind: ChangeKind::Removed,
                document: DocumentSnapshot::new(path, Some(fields)),
            });
        }
        changes
    }

    fn classify(&mut self, change: StoreChange) -> Option<DocumentChange> {
        let current = change
            .current
            .filter(|fields| self.query.matches(&change.path, fields));
        let (kind, fields) = match (self.visible.contains_key(&change.path), current) {
            (false, Some(fields)) => {
                self.visible.insert(change.path.clone(), fields.clone());
                (ChangeKind::Added, fields)
            }
            (true, Some(fields)) => {
                self.visible.insert(change.path.clone(), fields.clone());
                (ChangeKind::Modified, fields)
            }
            (true, None) => {
                let fields = self.visible.remove(&change.path)?;
                (ChangeKind::Removed, fields)
            }
            (false, None) => return None,
        };
        Some(DocumentChange {
            kind,
            document: DocumentSnapshot::new(change.path, Some(fields)),
        })
    }
}
