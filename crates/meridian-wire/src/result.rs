//! Transaction and operation result trees.
//!
//! Result codes are first-class values, not errors: a failed payment is a
//! perfectly good outcome to report, and the full tree is what gets archived
//! alongside the transaction.

use crate::ledger::OfferEntry;
use serde::{Deserialize, Serialize};

/// Outcome of validating or applying a whole transaction.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum TransactionResultCode {
    /// All operations applied.
    Success,
    /// One of the operations failed; see the per-operation results.
    Failed,
    /// Sequence number did not follow the source account's.
    BadSeq,
    /// Signatures were insufficient or left unconsumed.
    BadAuth,
    /// Fee below the ledger minimum for this operation count.
    InsufficientFee,
    /// Paying the fee would take the source below its reserve.
    InsufficientBalance,
    /// Source account does not exist.
    NoAccount,
    /// Transaction carries no operations.
    MissingOperation,
    /// Close time before the transaction's minimum time bound.
    TooEarly,
    /// Close time after the transaction's maximum time bound.
    TooLate,
}

/// Outcome of a CreateAccount operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum CreateAccountResult {
    Success,
    Malformed,
    Underfunded,
    LowReserve,
    AlreadyExists,
}

/// Outcome of a Payment operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum PaymentResult {
    Success,
    Malformed,
    Underfunded,
    SrcNoTrust,
    SrcNotAuthorized,
    NoDestination,
    NoTrust,
    NotAuthorized,
    LineFull,
}

/// Outcome of a ManageOffer operation.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ManageOfferResult {
    /// Offer created or updated; deleted offers carry `None`.
    Success { offer: Option<OfferEntry> },
    Malformed,
    SellNoTrust,
    BuyNoTrust,
    SellNotAuthorized,
    BuyNotAuthorized,
    LowReserve,
    NotFound,
}

/// Outcome of a SetOptions operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SetOptionsResult {
    Success,
    LowReserve,
    TooManySigners,
    BadFlags,
    ThresholdOutOfRange,
    BadSigner,
    InvalidInflation,
}

/// Outcome of a ChangeTrust operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ChangeTrustResult {
    Success,
    Malformed,
    NoIssuer,
    InvalidLimit,
    LowReserve,
    SelfNotAllowed,
}

/// Outcome of an AllowTrust operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum AllowTrustResult {
    Success,
    Malformed,
    NoTrustLine,
    TrustNotRequired,
    CantRevoke,
}

/// Outcome of an AccountMerge operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum AccountMergeResult {
    /// The balance moved into the destination.
    Success { source_account_balance: i64 },
    Malformed,
    NoAccount,
    CreditHeld,
    HasCredit,
}

/// Outcome of an Inflation operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum InflationResult {
    /// The amount minted into the fee pool this run.
    Success { minted: i64 },
    NotTime,
}

/// Typed result for an operation that ran its own logic.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum OperationResultTr {
    CreateAccount(CreateAccountResult),
    Payment(PaymentResult),
    ManageOffer(ManageOfferResult),
    SetOptions(SetOptionsResult),
    ChangeTrust(ChangeTrustResult),
    AllowTrust(AllowTrustResult),
    AccountMerge(AccountMergeResult),
    Inflation(InflationResult),
}

/// Result slot for one operation in a transaction.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum OperationResult {
    /// A prior operation failed, so this one never ran.
    NotAttempted,
    /// The operation source's signatures did not meet its threshold.
    BadAuth,
    /// The operation source account does not exist.
    NoAccount,
    /// The operation ran; see the typed result.
    Inner(OperationResultTr),
}

/// The complete result of one transaction.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TransactionResult {
    /// The fee actually debited, regardless of outcome.
    pub fee_charged: i64,
    pub code: TransactionResultCode,
    pub op_results: Vec<OperationResult>,
}

impl TransactionResult {
    /// A result shell with every operation marked not attempted.
    pub fn new(fee_charged: i64, op_count: usize) -> Self {
        Self {
            fee_charged,
            code: TransactionResultCode::Success,
            op_results: vec![OperationResult::NotAttempted; op_count],
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == TransactionResultCode::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_shell() {
        let result = TransactionResult::new(200, 2);
        assert!(result.is_success());
        assert_eq!(result.op_results.len(), 2);
        assert_eq!(result.op_results[0], OperationResult::NotAttempted);
    }
}
