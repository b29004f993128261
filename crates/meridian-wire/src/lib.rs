//! Wire data model for Meridian.
//!
//! Every type that crosses a subsystem boundary lives here: ledger entries
//! and their keys, the ledger header, transaction envelopes and their result
//! tree, and the consensus statement types. All types are plain data with
//! structural equality; canonical bytes come from [`canonical_bytes`] and
//! feed the content hashes computed elsewhere.

mod codec;
mod ledger;
mod result;
mod scp;
mod tx;

pub use codec::canonical_bytes;
pub use ledger::{
    AccountEntry, Asset, LedgerEntry, LedgerEntryData, LedgerHeader, LedgerKey, OfferEntry, Price,
    Signer, Thresholds, TrustLineEntry, AUTH_REQUIRED_FLAG, AUTH_REVOCABLE_FLAG,
    TRUSTLINE_AUTHORIZED_FLAG,
};
pub use result::{
    AccountMergeResult, AllowTrustResult, ChangeTrustResult, CreateAccountResult, InflationResult,
    ManageOfferResult, OperationResult, OperationResultTr, PaymentResult, SetOptionsResult,
    TransactionResult, TransactionResultCode,
};
pub use scp::{
    Ballot, NodeId, QuorumSet, ScpEnvelope, ScpNomination, ScpStatement, ScpStatementConfirm,
    ScpStatementExternalize, ScpStatementPledges, ScpStatementPrepare, Value,
};
pub use tx::{
    AccountId, AccountMergeOp, AllowTrustOp, ChangeTrustOp, CreateAccountOp, DecoratedSignature,
    ManageOfferOp, Operation, OperationBody, PaymentOp, SetOptionsOp, SignatureHint, TimeBounds,
    Transaction, TransactionEnvelope,
};
