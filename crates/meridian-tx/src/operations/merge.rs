//! AccountMerge: fold the source account into a destination.
//!
//! The deleted account must not have issued credit anyone still trusts,
//! must not hold credit itself, and takes its offers and trustlines with
//! it. The native balance moves to the destination.

use crate::state::{AccountFrame, OfferFrame, TrustLineFrame};
use crate::{OpContext, Result};
use meridian_ledger::LedgerDelta;
use meridian_wire::{AccountId, AccountMergeOp, AccountMergeResult};

pub(super) fn check_valid(op: &AccountMergeOp, source_id: &AccountId) -> Option<AccountMergeResult> {
    // merging into self is never meaningful
    if op.destination == *source_id {
        return Some(AccountMergeResult::Malformed);
    }
    None
}

pub(super) fn apply(
    op: &AccountMergeOp,
    source: AccountFrame,
    delta: &mut LedgerDelta<'_>,
    ctx: &OpContext<'_>,
) -> Result<AccountMergeResult> {
    let source_id = source.account.account_id;

    let Some(mut dest) = AccountFrame::load(ctx.store, &op.destination)? else {
        ctx.metrics
            .mark(&["op-merge", "failure", "no-account"]);
        return Ok(AccountMergeResult::NoAccount);
    };

    if ctx.store.has_issued(&source_id)? {
        ctx.metrics
            .mark(&["op-merge", "failure", "credit-held"]);
        return Ok(AccountMergeResult::CreditHeld);
    }

    let lines = ctx.store.trustlines_of(&source_id)?;
    if lines.iter().any(|line| line.balance > 0) {
        ctx.metrics.mark(&["op-merge", "failure", "has-credit"]);
        return Ok(AccountMergeResult::HasCredit);
    }

    for offer in ctx.store.offers_of(&source_id)? {
        OfferFrame::new(offer).store_delete(delta, ctx.store)?;
    }
    for line in lines {
        TrustLineFrame::new(line).store_delete(delta, ctx.store)?;
    }

    let source_balance = source.account.balance;
    dest.account.balance += source_balance;
    dest.store_change(delta, ctx.store)?;
    source.store_delete(delta, ctx.store)?;

    ctx.metrics.mark(&["op-merge", "success", "apply"]);
    Ok(AccountMergeResult::Success {
        source_account_balance: source_balance,
    })
}
