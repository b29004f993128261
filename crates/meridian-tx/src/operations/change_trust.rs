//! ChangeTrust: create, resize or delete a trustline.

use crate::state::{AccountFrame, TrustLineFrame};
use crate::{OpContext, Result};
use meridian_ledger::LedgerDelta;
use meridian_wire::{
    Asset, ChangeTrustOp, ChangeTrustResult, TrustLineEntry, AUTH_REQUIRED_FLAG,
    TRUSTLINE_AUTHORIZED_FLAG,
};

pub(super) fn check_valid(op: &ChangeTrustOp) -> Option<ChangeTrustResult> {
    if op.asset.is_native() {
        return Some(ChangeTrustResult::Malformed);
    }
    if op.limit < 0 {
        return Some(ChangeTrustResult::InvalidLimit);
    }
    None
}

pub(super) fn apply(
    op: &ChangeTrustOp,
    source: &mut AccountFrame,
    delta: &mut LedgerDelta<'_>,
    ctx: &OpContext<'_>,
) -> Result<ChangeTrustResult> {
    let source_id = source.account.account_id;
    let Asset::Credit { issuer, .. } = op.asset else {
        return Ok(ChangeTrustResult::Malformed);
    };
    if issuer == source_id {
        return Ok(ChangeTrustResult::SelfNotAllowed);
    }

    if let Some(mut line) = TrustLineFrame::load(ctx.store, &source_id, &op.asset)? {
        if op.limit == 0 {
            // the line cannot be dropped while it holds a balance
            if line.line.balance > 0 {
                return Ok(ChangeTrustResult::InvalidLimit);
            }
            line.store_delete(delta, ctx.store)?;
            source.account.num_sub_entries -= 1;
            source.store_change(delta, ctx.store)?;
            ctx.metrics.mark(&["op-change-trust", "success", "delete"]);
            return Ok(ChangeTrustResult::Success);
        }
        if op.limit < line.line.balance {
            return Ok(ChangeTrustResult::InvalidLimit);
        }
        line.line.limit = op.limit;
        line.store_change(delta, ctx.store)?;
        ctx.metrics.mark(&["op-change-trust", "success", "update"]);
        return Ok(ChangeTrustResult::Success);
    }

    if op.limit == 0 {
        return Ok(ChangeTrustResult::InvalidLimit);
    }
    let Some(issuer_account) = AccountFrame::load(ctx.store, &issuer)? else {
        ctx.metrics
            .mark(&["op-change-trust", "failure", "no-issuer"]);
        return Ok(ChangeTrustResult::NoIssuer);
    };

    let header = delta.header().clone();
    let reserve_after =
        (2 + source.account.num_sub_entries as i64 + 1) * header.base_reserve as i64;
    if source.account.balance < reserve_after {
        ctx.metrics
            .mark(&["op-change-trust", "failure", "low-reserve"]);
        return Ok(ChangeTrustResult::LowReserve);
    }

    // issuers that require authorization start lines unauthorized
    let flags = if issuer_account.account.flags & AUTH_REQUIRED_FLAG == 0 {
        TRUSTLINE_AUTHORIZED_FLAG
    } else {
        0
    };
    let mut line = TrustLineFrame::new(TrustLineEntry {
        account_id: source_id,
        asset: op.asset,
        balance: 0,
        limit: op.limit,
        flags,
    });
    line.store_add(delta, ctx.store)?;
    source.account.num_sub_entries += 1;
    source.store_change(delta, ctx.store)?;

    ctx.metrics.mark(&["op-change-trust", "success", "create"]);
    Ok(ChangeTrustResult::Success)
}
