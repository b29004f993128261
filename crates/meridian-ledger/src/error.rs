//! Error types for ledger operations.

use thiserror::Error;

/// Errors that can occur while working with ledger deltas.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Delta operation on a closed delta, or violated set disjointness.
    /// Programmer error; the containing transaction must abort.
    #[error("invalid delta operation: {0}")]
    InvalidOp(String),

    /// Commit found the outer header mutated outside the delta protocol.
    #[error("outer ledger header changed behind the delta")]
    HeaderRace,

    /// Paranoid check found the delta disagreeing with the store.
    #[error("inconsistent state: {0}")]
    Inconsistent(String),

    /// Store failure.
    #[error("store error: {0}")]
    Store(#[from] meridian_store::StoreError),
}
