//! ManageOffer: create, update or delete an offer entry.
//!
//! Matching against the book is the exchange engine's concern; this
//! operation only maintains the offer entries themselves, with trustline,
//! authorization and reserve discipline.

use crate::state::{AccountFrame, OfferFrame, TrustLineFrame};
use crate::{OpContext, Result};
use meridian_ledger::LedgerDelta;
use meridian_wire::{Asset, ManageOfferOp, ManageOfferResult, OfferEntry};

pub(super) fn check_valid(op: &ManageOfferOp) -> Option<ManageOfferResult> {
    if op.amount < 0 {
        return Some(ManageOfferResult::Malformed);
    }
    if op.price.n <= 0 || op.price.d <= 0 {
        return Some(ManageOfferResult::Malformed);
    }
    if op.selling == op.buying {
        return Some(ManageOfferResult::Malformed);
    }
    None
}

/// A credit asset is tradable by an account when it holds an authorized
/// trustline for it; issuers trade their own asset freely.
fn line_check(
    ctx: &OpContext<'_>,
    account: &meridian_wire::AccountId,
    asset: &Asset,
) -> Result<Option<bool>> {
    match asset {
        Asset::Native => Ok(Some(true)),
        Asset::Credit { issuer, .. } if issuer == account => Ok(Some(true)),
        Asset::Credit { .. } => match TrustLineFrame::load(ctx.store, account, asset)? {
            None => Ok(None),
            Some(line) => Ok(Some(line.line.is_authorized())),
        },
    }
}

pub(super) fn apply(
    op: &ManageOfferOp,
    source: &mut AccountFrame,
    delta: &mut LedgerDelta<'_>,
    ctx: &OpContext<'_>,
) -> Result<ManageOfferResult> {
    let source_id = source.account.account_id;

    if op.offer_id == 0 {
        if op.amount == 0 {
            return Ok(ManageOfferResult::Malformed);
        }
        match line_check(ctx, &source_id, &op.selling)? {
            None => return Ok(ManageOfferResult::SellNoTrust),
            Some(false) => return Ok(ManageOfferResult::SellNotAuthorized),
            Some(true) => {}
        }
        match line_check(ctx, &source_id, &op.buying)? {
            None => return Ok(ManageOfferResult::BuyNoTrust),
            Some(false) => return Ok(ManageOfferResult::BuyNotAuthorized),
            Some(true) => {}
        }

        let header = delta.header().clone();
        let reserve_after =
            (2 + source.account.num_sub_entries as i64 + 1) * header.base_reserve as i64;
        if source.account.balance < reserve_after {
            ctx.metrics
                .mark(&["op-manage-offer", "failure", "low-reserve"]);
            return Ok(ManageOfferResult::LowReserve);
        }

        let offer_id = {
            let header = delta.header_mut()?;
            header.id_pool += 1;
            header.id_pool
        };
        let offer = OfferEntry {
            account_id: source_id,
            offer_id,
            selling: op.selling,
            buying: op.buying,
            amount: op.amount,
            price: op.price,
        };
        OfferFrame::new(offer.clone()).store_add(delta, ctx.store)?;
        source.account.num_sub_entries += 1;
        source.store_change(delta, ctx.store)?;

        ctx.metrics.mark(&["op-manage-offer", "success", "create"]);
        return Ok(ManageOfferResult::Success { offer: Some(offer) });
    }

    let Some(mut existing) = OfferFrame::load(ctx.store, &source_id, op.offer_id)? else {
        ctx.metrics
            .mark(&["op-manage-offer", "failure", "not-found"]);
        return Ok(ManageOfferResult::NotFound);
    };

    if op.amount == 0 {
        existing.store_delete(delta, ctx.store)?;
        source.account.num_sub_entries -= 1;
        source.store_change(delta, ctx.store)?;
        ctx.metrics.mark(&["op-manage-offer", "success", "delete"]);
        return Ok(ManageOfferResult::Success { offer: None });
    }

    existing.offer.selling = op.selling;
    existing.offer.buying = op.buying;
    existing.offer.amount = op.amount;
    existing.offer.price = op.price;
    let updated = existing.offer.clone();
    existing.store_change(delta, ctx.store)?;

    ctx.metrics.mark(&["op-manage-offer", "success", "update"]);
    Ok(ManageOfferResult::Success {
        offer: Some(updated),
    })
}
