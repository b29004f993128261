//! Transaction application for Meridian.
//!
//! A [`TransactionFrame`] turns a signed envelope into an atomic sequence
//! of operations applied through nested ledger deltas: the fee is debited
//! first and survives failure, each operation gets its own delta, and a
//! transaction either commits whole or leaves only the fee debit behind.

mod apply;
mod error;
mod frame;
pub mod operations;
mod signature_checker;
pub mod state;

pub use apply::{
    close_ledger, ApplyConfig, LedgerCloseData, LedgerCloseResult, TransactionResultPair,
};
pub use error::TxError;
pub use frame::{contents_hash_for, header_hash, TransactionApply, TransactionFrame};
pub use operations::{OperationFrame, ThresholdLevel};
pub use signature_checker::SignatureChecker;

use meridian_common::Metrics;
use meridian_store::EntryStore;

/// Result type for transaction processing.
pub type Result<T> = std::result::Result<T, TxError>;

/// Collaborators an operation needs while validating or applying.
pub struct OpContext<'a> {
    pub store: &'a dyn EntryStore,
    pub metrics: &'a dyn Metrics,
}
