//! TiltPaint Core Library
//!
//! Stroke model, validation, history and persistence for the TiltPaint
//! drawing relay. Transport lives in `tiltpaint-server`.

pub mod history;
pub mod protocol;
pub mod storage;
pub mod stroke;
pub mod validate;

pub use history::{Snapshot, StrokeLog};
pub use protocol::{init_frame, ClientMessage, ServerMessage};
pub use storage::{FileStore, MemoryStore, StorageError, StorageResult, StrokeStore};
pub use stroke::StrokeSegment;
pub use validate::{classify, classify_value, validate_segment, Inbound, Rejection};
