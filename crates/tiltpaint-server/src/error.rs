//! Process-level errors.

use thiserror::Error;
use tiltpaint_core::StorageError;

/// Errors that stop the relay from starting or serving.
///
/// Everything that can go wrong with a single connection is handled inside
/// its session and never surfaces here.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
    #[error("History store error: {0}")]
    Storage(#[from] StorageError),
}
