//! Error types for entry storage.

use thiserror::Error;

/// Errors that can occur in the entry store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Paranoid check found the store disagreeing with an expected entry.
    #[error("inconsistent state: {0}")]
    Inconsistent(String),

    /// Backend failure.
    #[error("storage error: {0}")]
    Storage(String),
}
