use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;

use super::document::DocumentChange;
use super::error::StorageError;

pub type ChangeBatch = Result<Vec<DocumentChange>, StorageError>;

/// Live feed of changes for one query.
///
/// Dropping the stream cancels the listener behind it.
pub struct ChangeStream {
    rx: Receiver<ChangeBatch>,
    listener: Option<JoinHandle<()>>,
}

impl ChangeStream {
    pub fn new(rx: Receiver<ChangeBatch>, listener: Option<JoinHandle<()>>) -> Self {
        Self { rx, listener }
    }

    /// Next batch, or `None` once the listener has stopped.
    pub async fn next(&mut self) -> Option<ChangeBatch> {
        self.rx.recv().await
    }

    /// Stops future delivery. Batches already buffered are discarded.
    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.rx.close();
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        self.stop();
    }
}
