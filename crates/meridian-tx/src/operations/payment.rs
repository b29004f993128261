//! Payment: move native tokens or issued credit to a destination.

use crate::state::{AccountFrame, TrustLineFrame};
use crate::{OpContext, Result};
use meridian_ledger::LedgerDelta;
use meridian_wire::{Asset, PaymentOp, PaymentResult};

pub(super) fn check_valid(op: &PaymentOp) -> Option<PaymentResult> {
    if op.amount <= 0 {
        return Some(PaymentResult::Malformed);
    }
    None
}

pub(super) fn apply(
    op: &PaymentOp,
    source: &mut AccountFrame,
    delta: &mut LedgerDelta<'_>,
    ctx: &OpContext<'_>,
) -> Result<PaymentResult> {
    let source_id = source.account.account_id;
    match op.asset {
        Asset::Native => {
            let Some(mut dest) = AccountFrame::load(ctx.store, &op.destination)? else {
                ctx.metrics
                    .mark(&["op-payment", "failure", "no-destination"]);
                return Ok(PaymentResult::NoDestination);
            };
            let header = delta.header().clone();
            if source.account.balance - op.amount < source.account.min_balance(&header) {
                ctx.metrics.mark(&["op-payment", "failure", "underfunded"]);
                return Ok(PaymentResult::Underfunded);
            }
            if op.destination == source_id {
                // nothing moves
                ctx.metrics.mark(&["op-payment", "success", "apply"]);
                return Ok(PaymentResult::Success);
            }
            source.account.balance -= op.amount;
            source.store_change(delta, ctx.store)?;
            dest.account.balance += op.amount;
            dest.store_change(delta, ctx.store)?;
        }
        Asset::Credit { issuer, .. } => {
            if AccountFrame::load(ctx.store, &op.destination)?.is_none() {
                ctx.metrics
                    .mark(&["op-payment", "failure", "no-destination"]);
                return Ok(PaymentResult::NoDestination);
            }

            // the issuer mints without holding a line
            if source_id != issuer {
                let Some(mut line) = TrustLineFrame::load(ctx.store, &source_id, &op.asset)?
                else {
                    return Ok(PaymentResult::SrcNoTrust);
                };
                if !line.line.is_authorized() {
                    return Ok(PaymentResult::SrcNotAuthorized);
                }
                if line.line.balance < op.amount {
                    ctx.metrics.mark(&["op-payment", "failure", "underfunded"]);
                    return Ok(PaymentResult::Underfunded);
                }
                line.line.balance -= op.amount;
                line.store_change(delta, ctx.store)?;
            }

            // the issuer burns without holding a line
            if op.destination != issuer {
                // a self-payment reloads the line just debited, so the
                // credit below restores it; the store cache keeps this
                // coherent
                let Some(mut line) =
                    TrustLineFrame::load(ctx.store, &op.destination, &op.asset)?
                else {
                    return Ok(PaymentResult::NoTrust);
                };
                if !line.line.is_authorized() {
                    return Ok(PaymentResult::NotAuthorized);
                }
                if line.line.balance + op.amount > line.line.limit {
                    return Ok(PaymentResult::LineFull);
                }
                line.line.balance += op.amount;
                line.store_change(delta, ctx.store)?;
            }
        }
    }

    ctx.metrics.mark(&["op-payment", "success", "apply"]);
    Ok(PaymentResult::Success)
}
