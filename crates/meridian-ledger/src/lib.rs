//! Ledger state mutation for Meridian.
//!
//! This crate provides [`LedgerDelta`], the transactional in-memory
//! write-set that buffers, composes and atomically commits changes to
//! ledger entries while transactions and operations apply. Deltas nest;
//! the root delta is bound to the canonical [`meridian_wire::LedgerHeader`]
//! and an [`meridian_store::EntryStore`], and its commit is the only point
//! where buffered mutations become durable.

mod changes;
mod delta;
mod error;

pub use changes::{mark_meters, updated_account_balance, EntryChange};
pub use delta::{DeltaState, LedgerDelta};
pub use error::LedgerError;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
