//! Transaction envelopes and operation bodies.

use crate::ledger::{Asset, Price, Signer};
use serde::{Deserialize, Serialize};

pub use crate::ledger::AccountId;

/// First four bytes of the signing key, letting verifiers skip signers that
/// cannot have produced a signature.
pub type SignatureHint = [u8; 4];

/// A signature together with the hint of the key that produced it.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DecoratedSignature {
    pub hint: SignatureHint,
    pub signature: Vec<u8>,
}

/// Validity window for a transaction, in ledger close time.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TimeBounds {
    pub min_time: u64,
    /// Zero means no upper bound.
    pub max_time: u64,
}

/// Create a new account funded from the operation source.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CreateAccountOp {
    pub destination: AccountId,
    pub starting_balance: i64,
}

/// Send an amount of an asset to a destination account.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PaymentOp {
    pub destination: AccountId,
    pub asset: Asset,
    pub amount: i64,
}

/// Create, update or delete an offer.
///
/// `offer_id` zero creates a new offer; a zero `amount` deletes an existing
/// one.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ManageOfferOp {
    pub selling: Asset,
    pub buying: Asset,
    pub amount: i64,
    pub price: Price,
    pub offer_id: u64,
}

/// Adjust account options. Every field is optional; only present fields are
/// applied.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct SetOptionsOp {
    pub inflation_dest: Option<AccountId>,
    pub clear_flags: Option<u32>,
    pub set_flags: Option<u32>,
    pub master_weight: Option<u32>,
    pub low_threshold: Option<u32>,
    pub med_threshold: Option<u32>,
    pub high_threshold: Option<u32>,
    pub home_domain: Option<String>,
    /// Add or update a signer; weight zero removes it.
    pub signer: Option<Signer>,
}

/// Create, update or delete a trustline for the source account.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ChangeTrustOp {
    pub asset: Asset,
    /// Zero deletes the trustline.
    pub limit: i64,
}

/// Issuer-side authorization toggle for a holder's trustline.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AllowTrustOp {
    pub trustor: AccountId,
    pub asset_code: [u8; 4],
    pub authorize: bool,
}

/// Merge the source account into the destination.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AccountMergeOp {
    pub destination: AccountId,
}

/// The body of one operation.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum OperationBody {
    CreateAccount(CreateAccountOp),
    Payment(PaymentOp),
    ManageOffer(ManageOfferOp),
    SetOptions(SetOptionsOp),
    ChangeTrust(ChangeTrustOp),
    AllowTrust(AllowTrustOp),
    AccountMerge(AccountMergeOp),
    Inflation,
}

impl OperationBody {
    /// Short name for metrics and logs.
    pub fn name(&self) -> &'static str {
        match self {
            OperationBody::CreateAccount(_) => "create-account",
            OperationBody::Payment(_) => "payment",
            OperationBody::ManageOffer(_) => "manage-offer",
            OperationBody::SetOptions(_) => "set-options",
            OperationBody::ChangeTrust(_) => "change-trust",
            OperationBody::AllowTrust(_) => "allow-trust",
            OperationBody::AccountMerge(_) => "account-merge",
            OperationBody::Inflation => "inflation",
        }
    }
}

/// One operation, optionally overriding the transaction source account.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Operation {
    pub source_account: Option<AccountId>,
    pub body: OperationBody,
}

/// The signed body of a transaction.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub source_account: AccountId,
    pub fee: u32,
    pub seq_num: i64,
    pub time_bounds: Option<TimeBounds>,
    pub operations: Vec<Operation>,
}

/// A transaction body plus the signatures over its content hash.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub tx: Transaction,
    pub signatures: Vec<DecoratedSignature>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names() {
        let op = OperationBody::Payment(PaymentOp {
            destination: AccountId([0; 32]),
            asset: Asset::Native,
            amount: 1,
        });
        assert_eq!(op.name(), "payment");
        assert_eq!(OperationBody::Inflation.name(), "inflation");
    }
}
