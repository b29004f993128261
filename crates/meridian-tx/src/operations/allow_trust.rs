//! AllowTrust: issuer-side authorization toggle on a holder's trustline.

use crate::state::{AccountFrame, TrustLineFrame};
use crate::{OpContext, Result};
use meridian_ledger::LedgerDelta;
use meridian_wire::{
    AllowTrustOp, AllowTrustResult, Asset, AUTH_REQUIRED_FLAG, AUTH_REVOCABLE_FLAG,
    TRUSTLINE_AUTHORIZED_FLAG,
};

pub(super) fn check_valid(op: &AllowTrustOp) -> Option<AllowTrustResult> {
    if op.asset_code == [0u8; 4] {
        return Some(AllowTrustResult::Malformed);
    }
    None
}

pub(super) fn apply(
    op: &AllowTrustOp,
    source: &mut AccountFrame,
    delta: &mut LedgerDelta<'_>,
    ctx: &OpContext<'_>,
) -> Result<AllowTrustResult> {
    if source.account.flags & AUTH_REQUIRED_FLAG == 0 {
        return Ok(AllowTrustResult::TrustNotRequired);
    }
    if !op.authorize && source.account.flags & AUTH_REVOCABLE_FLAG == 0 {
        return Ok(AllowTrustResult::CantRevoke);
    }

    let asset = Asset::credit(op.asset_code, source.account.account_id);
    let Some(mut line) = TrustLineFrame::load(ctx.store, &op.trustor, &asset)? else {
        ctx.metrics
            .mark(&["op-allow-trust", "failure", "no-trust-line"]);
        return Ok(AllowTrustResult::NoTrustLine);
    };

    if op.authorize {
        line.line.flags |= TRUSTLINE_AUTHORIZED_FLAG;
    } else {
        line.line.flags &= !TRUSTLINE_AUTHORIZED_FLAG;
    }
    line.store_change(delta, ctx.store)?;

    ctx.metrics.mark(&["op-allow-trust", "success", "apply"]);
    Ok(AllowTrustResult::Success)
}
