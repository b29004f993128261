//! The operation family.
//!
//! Each operation kind is a variant of [`meridian_wire::OperationBody`] with
//! a module here implementing its static validation and its application.
//! [`OperationFrame`] is the common surface: it resolves the operation
//! source, checks the source's signer threshold through the transaction's
//! shared [`SignatureChecker`], and dispatches by variant.

mod allow_trust;
mod change_trust;
mod create_account;
mod inflation;
mod manage_offer;
mod merge;
mod payment;
mod set_options;

pub use inflation::INFLATION_FREQUENCY;

use crate::signature_checker::SignatureChecker;
use crate::state::AccountFrame;
use crate::{OpContext, Result};
use meridian_ledger::LedgerDelta;
use meridian_wire::{
    AccountEntry, AccountId, Operation, OperationBody, OperationResult, OperationResultTr,
};
use tracing::debug;

/// Which signer threshold of the source account authorizes an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdLevel {
    Low,
    Medium,
    High,
}

/// One operation bound to its position in a transaction.
pub struct OperationFrame<'a> {
    op: &'a Operation,
    tx_source: AccountId,
}

impl<'a> OperationFrame<'a> {
    pub fn new(op: &'a Operation, tx_source: AccountId) -> Self {
        Self { op, tx_source }
    }

    /// The account this operation acts for: its own source if set, else the
    /// transaction source.
    pub fn source_id(&self) -> AccountId {
        self.op.source_account.unwrap_or(self.tx_source)
    }

    /// Which threshold the source account must clear for this operation.
    pub fn needed_threshold(&self) -> ThresholdLevel {
        match &self.op.body {
            OperationBody::AllowTrust(_) => ThresholdLevel::Low,
            OperationBody::AccountMerge(_) => ThresholdLevel::High,
            OperationBody::SetOptions(op) => {
                let touches_auth = op.master_weight.is_some()
                    || op.low_threshold.is_some()
                    || op.med_threshold.is_some()
                    || op.high_threshold.is_some()
                    || op.signer.is_some();
                if touches_auth {
                    ThresholdLevel::High
                } else {
                    ThresholdLevel::Medium
                }
            }
            _ => ThresholdLevel::Medium,
        }
    }

    fn threshold_weight(&self, account: &AccountEntry) -> u32 {
        match self.needed_threshold() {
            ThresholdLevel::Low => account.thresholds.low(),
            ThresholdLevel::Medium => account.thresholds.medium(),
            ThresholdLevel::High => account.thresholds.high(),
        }
    }

    /// Static validity checks, independent of ledger state.
    ///
    /// Returns `None` when the operation is well-formed, or the typed
    /// failure code otherwise.
    pub fn do_check_valid(&self) -> Option<OperationResultTr> {
        match &self.op.body {
            OperationBody::CreateAccount(op) => {
                create_account::check_valid(op).map(OperationResultTr::CreateAccount)
            }
            OperationBody::Payment(op) => payment::check_valid(op).map(OperationResultTr::Payment),
            OperationBody::ManageOffer(op) => {
                manage_offer::check_valid(op).map(OperationResultTr::ManageOffer)
            }
            OperationBody::SetOptions(op) => {
                set_options::check_valid(op, &self.source_id()).map(OperationResultTr::SetOptions)
            }
            OperationBody::ChangeTrust(op) => {
                change_trust::check_valid(op).map(OperationResultTr::ChangeTrust)
            }
            OperationBody::AllowTrust(op) => {
                allow_trust::check_valid(op).map(OperationResultTr::AllowTrust)
            }
            OperationBody::AccountMerge(op) => {
                merge::check_valid(op, &self.source_id()).map(OperationResultTr::AccountMerge)
            }
            OperationBody::Inflation => None,
        }
    }

    /// Validation-only path: source account, threshold signature, static
    /// checks. Returns `None` when the operation is valid.
    pub fn check_valid(
        &self,
        checker: &mut SignatureChecker<'_>,
        ctx: &OpContext<'_>,
    ) -> Result<Option<OperationResult>> {
        let Some(source) = AccountFrame::load(ctx.store, &self.source_id())? else {
            ctx.metrics
                .mark(&[self.op.body.name(), "invalid", "no-account"]);
            return Ok(Some(OperationResult::NoAccount));
        };
        if !checker.check_signature(
            &source.account.signers_with_master(),
            self.threshold_weight(&source.account),
        ) {
            ctx.metrics
                .mark(&[self.op.body.name(), "invalid", "bad-auth"]);
            return Ok(Some(OperationResult::BadAuth));
        }
        if let Some(code) = self.do_check_valid() {
            ctx.metrics
                .mark(&[self.op.body.name(), "invalid", "malformed"]);
            return Ok(Some(OperationResult::Inner(code)));
        }
        Ok(None)
    }

    /// Apply this operation into `delta`.
    ///
    /// The returned result carries the typed outcome; [`is_success`] decides
    /// whether the enclosing transaction keeps going.
    pub fn apply(
        &self,
        checker: &mut SignatureChecker<'_>,
        delta: &mut LedgerDelta<'_>,
        ctx: &OpContext<'_>,
    ) -> Result<OperationResult> {
        if let Some(invalid) = self.check_valid(checker, ctx)? {
            return Ok(invalid);
        }
        // check_valid proved the account exists
        let mut source = AccountFrame::load(ctx.store, &self.source_id())?
            .ok_or_else(|| crate::TxError::UnexpectedState("source vanished".into()))?;

        let tr = match &self.op.body {
            OperationBody::CreateAccount(op) => OperationResultTr::CreateAccount(
                create_account::apply(op, &mut source, delta, ctx)?,
            ),
            OperationBody::Payment(op) => {
                OperationResultTr::Payment(payment::apply(op, &mut source, delta, ctx)?)
            }
            OperationBody::ManageOffer(op) => {
                OperationResultTr::ManageOffer(manage_offer::apply(op, &mut source, delta, ctx)?)
            }
            OperationBody::SetOptions(op) => {
                OperationResultTr::SetOptions(set_options::apply(op, &mut source, delta, ctx)?)
            }
            OperationBody::ChangeTrust(op) => {
                OperationResultTr::ChangeTrust(change_trust::apply(op, &mut source, delta, ctx)?)
            }
            OperationBody::AllowTrust(op) => {
                OperationResultTr::AllowTrust(allow_trust::apply(op, &mut source, delta, ctx)?)
            }
            OperationBody::AccountMerge(op) => {
                OperationResultTr::AccountMerge(merge::apply(op, source, delta, ctx)?)
            }
            OperationBody::Inflation => {
                OperationResultTr::Inflation(inflation::apply(delta, ctx)?)
            }
        };

        if !tr_is_success(&tr) {
            debug!(op = self.op.body.name(), result = ?tr, "operation failed");
        }
        Ok(OperationResult::Inner(tr))
    }
}

/// Whether a typed operation result is its success variant.
pub fn tr_is_success(tr: &OperationResultTr) -> bool {
    use meridian_wire::{
        AccountMergeResult, AllowTrustResult, ChangeTrustResult, CreateAccountResult,
        InflationResult, ManageOfferResult, PaymentResult, SetOptionsResult,
    };
    match tr {
        OperationResultTr::CreateAccount(r) => matches!(r, CreateAccountResult::Success),
        OperationResultTr::Payment(r) => matches!(r, PaymentResult::Success),
        OperationResultTr::ManageOffer(r) => matches!(r, ManageOfferResult::Success { .. }),
        OperationResultTr::SetOptions(r) => matches!(r, SetOptionsResult::Success),
        OperationResultTr::ChangeTrust(r) => matches!(r, ChangeTrustResult::Success),
        OperationResultTr::AllowTrust(r) => matches!(r, AllowTrustResult::Success),
        OperationResultTr::AccountMerge(r) => matches!(r, AccountMergeResult::Success { .. }),
        OperationResultTr::Inflation(r) => matches!(r, InflationResult::Success { .. }),
    }
}

/// Whether an operation result slot reports success.
pub fn is_success(result: &OperationResult) -> bool {
    match result {
        OperationResult::Inner(tr) => tr_is_success(tr),
        _ => false,
    }
}
