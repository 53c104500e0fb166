//! In-memory stroke store.

use super::{BoxFuture, StorageError, StorageResult, StrokeStore};
use crate::stroke::StrokeSegment;
use std::sync::RwLock;

/// In-memory store for tests and runs without durable history.
#[derive(Default)]
pub struct MemoryStore {
    strokes: RwLock<Vec<StrokeSegment>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds some history.
    pub fn with_strokes(strokes: Vec<StrokeSegment>) -> Self {
        Self {
            strokes: RwLock::new(strokes),
        }
    }

    /// Copy of what is currently stored.
    pub fn strokes(&self) -> Vec<StrokeSegment> {
        self.strokes.read().map(|s| s.clone()).unwrap_or_default()
    }
}

impl StrokeStore for MemoryStore {
    fn load(&self) -> BoxFuture<'_, StorageResult<Vec<StrokeSegment>>> {
        Box::pin(async move {
            let strokes = self.strokes.read().map_err(|e| {
                StorageError::Other(format!("Lock error: {}", e))
            })?;
            Ok(strokes.clone())
        })
    }

    fn append(&self, segment: &StrokeSegment) -> BoxFuture<'_, StorageResult<()>> {
        let segment = segment.clone();
        Box::pin(async move {
            let mut strokes = self.strokes.write().map_err(|e| {
                StorageError::Other(format!("Lock error: {}", e))
            })?;
            strokes.push(segment);
            Ok(())
        })
    }

    fn reset(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            let mut strokes = self.strokes.write().map_err(|e| {
                StorageError::Other(format!("Lock error: {}", e))
            })?;
            strokes.clear();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(x: f64) -> StrokeSegment {
        StrokeSegment::new((x, x), (x, x + 1.0), 1.0, [0, 0, 0, 255]).unwrap()
    }

    #[tokio::test]
    async fn test_append_and_load() {
        let store = MemoryStore::new();
        store.append(&segment(1.0)).await.unwrap();
        store.append(&segment(2.0)).await.unwrap();

        assert_eq!(store.load().await.unwrap(), vec![segment(1.0), segment(2.0)]);
    }

    #[tokio::test]
    async fn test_reset() {
        let store = MemoryStore::with_strokes(vec![segment(1.0)]);
        store.reset().await.unwrap();

        assert!(store.load().await.unwrap().is_empty());
        assert!(store.strokes().is_empty());
    }
}
