//! Durable stroke history.
//!
//! A store observes the stroke log: it is told about every accepted segment
//! and every clear, and replays what it kept when the relay starts.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::stroke::StrokeSegment;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for storage operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for stroke history backends.
///
/// Appends must land in the order they are issued, so that a restart
/// replays strokes in the order they were drawn.
pub trait StrokeStore: Send + Sync {
    /// Read back every stored segment in admission order.
    ///
    /// Records that cannot be decoded are skipped, not fatal.
    fn load(&self) -> BoxFuture<'_, StorageResult<Vec<StrokeSegment>>>;

    /// Store one more segment at the end.
    fn append(&self, segment: &StrokeSegment) -> BoxFuture<'_, StorageResult<()>>;

    /// Forget everything stored.
    fn reset(&self) -> BoxFuture<'_, StorageResult<()>>;
}
