//! Error types for transaction processing.
//!
//! These are structural failures only. Domain outcomes (a payment that
//! bounces, a merge refused for held credit) travel as result codes in the
//! [`meridian_wire::TransactionResult`] tree, never as errors.

use thiserror::Error;

/// Errors that can occur while applying transactions.
#[derive(Debug, Error)]
pub enum TxError {
    /// Delta misuse or header race below us.
    #[error("ledger error: {0}")]
    Ledger(#[from] meridian_ledger::LedgerError),

    /// Store failure.
    #[error("store error: {0}")]
    Store(#[from] meridian_store::StoreError),

    /// State that the transaction-set sanitation upstream should have made
    /// impossible, e.g. a fee debit for a missing account.
    #[error("unexpected state: {0}")]
    UnexpectedState(String),
}
