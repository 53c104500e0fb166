//! Background writer that mirrors the stroke log into a [`StrokeStore`].
//!
//! Durability is advisory: the live session never waits on the disk and
//! never learns about a failed write. A failure is logged and the next
//! operation is attempted as usual. Operations are applied strictly in the
//! order they were queued, which is the order the log accepted them.

use std::sync::Arc;
use tiltpaint_core::{StrokeSegment, StrokeStore};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

enum PersistOp {
    Append(StrokeSegment),
    Reset,
    Flush(oneshot::Sender<()>),
}

/// Handle to the writer task. Cheap to clone.
#[derive(Clone)]
pub struct Persister {
    tx: mpsc::UnboundedSender<PersistOp>,
}

impl Persister {
    /// Start the writer task for `store`.
    ///
    /// The task ends once every handle is dropped and the queue is drained.
    pub fn spawn(store: Arc<dyn StrokeStore>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(store, rx));
        (Self { tx }, handle)
    }

    /// Queue a segment for storage.
    pub fn append(&self, segment: StrokeSegment) {
        self.submit(PersistOp::Append(segment));
    }

    /// Queue a truncation of the store.
    pub fn reset(&self) {
        self.submit(PersistOp::Reset);
    }

    /// Wait until everything queued so far has been applied.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(PersistOp::Flush(done_tx));
        let _ = done_rx.await;
    }

    fn submit(&self, op: PersistOp) {
        if self.tx.send(op).is_err() {
            warn!("History writer has stopped; change not persisted");
        }
    }
}

async fn run(store: Arc<dyn StrokeStore>, mut rx: mpsc::UnboundedReceiver<PersistOp>) {
    while let Some(op) = rx.recv().await {
        match op {
            PersistOp::Append(segment) => {
                if let Err(e) = store.append(&segment).await {
                    warn!("Failed to persist stroke: {}", e);
                }
            }
            PersistOp::Reset => {
                if let Err(e) = store.reset().await {
                    warn!("Failed to reset stroke history: {}", e);
                }
            }
            PersistOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("History writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiltpaint_core::storage::{BoxFuture, StorageError, StorageResult};
    use tiltpaint_core::MemoryStore;

    fn segment(x: f64) -> StrokeSegment {
        StrokeSegment::new((x, 0.0), (x, 1.0), 1.0, [0, 0, 0, 255]).unwrap()
    }

    /// Store whose writes always fail.
    struct BrokenStore;

    impl StrokeStore for BrokenStore {
        fn load(&self) -> BoxFuture<'_, StorageResult<Vec<StrokeSegment>>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn append(&self, _segment: &StrokeSegment) -> BoxFuture<'_, StorageResult<()>> {
            Box::pin(async { Err(StorageError::Io("disk full".to_string())) })
        }

        fn reset(&self) -> BoxFuture<'_, StorageResult<()>> {
            Box::pin(async { Err(StorageError::Io("disk full".to_string())) })
        }
    }

    #[tokio::test]
    async fn test_operations_apply_in_order() {
        let store = Arc::new(MemoryStore::new());
        let (persister, _handle) = Persister::spawn(store.clone());

        persister.append(segment(1.0));
        persister.append(segment(2.0));
        persister.reset();
        persister.append(segment(3.0));
        persister.flush().await;

        assert_eq!(store.strokes(), vec![segment(3.0)]);
    }

    #[tokio::test]
    async fn test_write_failures_are_swallowed() {
        let (persister, handle) = Persister::spawn(Arc::new(BrokenStore));

        persister.append(segment(1.0));
        persister.reset();
        persister.flush().await;

        drop(persister);
        handle.await.unwrap();
    }
}
