//! The stroke log: ordered history of everything painted since the last clear.

use crate::stroke::StrokeSegment;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A point-in-time copy of the history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Number of clears seen so far.
    pub epoch: u64,
    /// Segments in admission order.
    pub strokes: Vec<StrokeSegment>,
}

#[derive(Debug, Default)]
struct History {
    strokes: Vec<StrokeSegment>,
    epoch: u64,
}

/// Append-only stroke history shared by every connection.
///
/// The backing vector never leaves the lock; readers get copies. Appends and
/// clears take the write lock, so a [`Snapshot`] is always either entirely
/// before or entirely after any given mutation.
#[derive(Debug, Default)]
pub struct StrokeLog {
    inner: RwLock<History>,
}

impl StrokeLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log pre-populated with replayed history.
    pub fn with_strokes(strokes: Vec<StrokeSegment>) -> Self {
        Self {
            inner: RwLock::new(History { strokes, epoch: 0 }),
        }
    }

    /// Add a segment to the end. Returns the new length.
    pub fn append(&self, segment: StrokeSegment) -> usize {
        let mut history = self.write();
        history.strokes.push(segment);
        history.strokes.len()
    }

    /// Copy out the current history.
    pub fn snapshot(&self) -> Snapshot {
        let history = self.read();
        Snapshot {
            epoch: history.epoch,
            strokes: history.strokes.clone(),
        }
    }

    /// Drop all segments and start a new epoch. Returns the new epoch.
    pub fn clear(&self) -> u64 {
        let mut history = self.write();
        history.strokes = Vec::new();
        history.epoch += 1;
        history.epoch
    }

    pub fn len(&self) -> usize {
        self.read().strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn epoch(&self) -> u64 {
        self.read().epoch
    }

    // A panic while holding the lock cannot leave a half-written segment
    // behind (push and reassignment are the only mutations), so poisoning is
    // recovered rather than propagated.
    fn read(&self) -> RwLockReadGuard<'_, History> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, History> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
