//! SetOptions: account flags, thresholds, signers and home domain.

use crate::state::AccountFrame;
use crate::{OpContext, Result};
use meridian_ledger::LedgerDelta;
use meridian_wire::{
    AccountId, SetOptionsOp, SetOptionsResult, AUTH_REQUIRED_FLAG, AUTH_REVOCABLE_FLAG,
};

/// Upper bound on non-master signers per account.
const MAX_SIGNERS: usize = 20;

const KNOWN_FLAGS: u32 = AUTH_REQUIRED_FLAG | AUTH_REVOCABLE_FLAG;

pub(super) fn check_valid(op: &SetOptionsOp, source_id: &AccountId) -> Option<SetOptionsResult> {
    if let (Some(set), Some(clear)) = (op.set_flags, op.clear_flags) {
        if set & clear != 0 {
            return Some(SetOptionsResult::BadFlags);
        }
    }
    for flags in [op.set_flags, op.clear_flags].into_iter().flatten() {
        if flags & !KNOWN_FLAGS != 0 {
            return Some(SetOptionsResult::BadFlags);
        }
    }
    for weight in [
        op.master_weight,
        op.low_threshold,
        op.med_threshold,
        op.high_threshold,
    ]
    .into_iter()
    .flatten()
    {
        if weight > u8::MAX as u32 {
            return Some(SetOptionsResult::ThresholdOutOfRange);
        }
    }
    if let Some(signer) = &op.signer {
        if signer.key == *source_id {
            // the master key is managed through master_weight
            return Some(SetOptionsResult::BadSigner);
        }
    }
    None
}

pub(super) fn apply(
    op: &SetOptionsOp,
    source: &mut AccountFrame,
    delta: &mut LedgerDelta<'_>,
    ctx: &OpContext<'_>,
) -> Result<SetOptionsResult> {
    if let Some(dest) = op.inflation_dest {
        if AccountFrame::load(ctx.store, &dest)?.is_none() {
            return Ok(SetOptionsResult::InvalidInflation);
        }
        source.account.inflation_dest = Some(dest);
    }

    if let Some(clear) = op.clear_flags {
        source.account.flags &= !clear;
    }
    if let Some(set) = op.set_flags {
        source.account.flags |= set;
    }

    if let Some(weight) = op.master_weight {
        source.account.thresholds.0[0] = weight as u8;
    }
    if let Some(low) = op.low_threshold {
        source.account.thresholds.0[1] = low as u8;
    }
    if let Some(medium) = op.med_threshold {
        source.account.thresholds.0[2] = medium as u8;
    }
    if let Some(high) = op.high_threshold {
        source.account.thresholds.0[3] = high as u8;
    }

    if let Some(domain) = &op.home_domain {
        source.account.home_domain = domain.clone();
    }

    if let Some(signer) = &op.signer {
        let existing = source
            .account
            .signers
            .iter_mut()
            .find(|s| s.key == signer.key);
        if signer.weight > 0 {
            match existing {
                Some(slot) => slot.weight = signer.weight,
                None => {
                    if source.account.signers.len() >= MAX_SIGNERS {
                        return Ok(SetOptionsResult::TooManySigners);
                    }
                    let header = delta.header().clone();
                    let reserve_after = (2 + source.account.num_sub_entries as i64 + 1)
                        * header.base_reserve as i64;
                    if source.account.balance < reserve_after {
                        ctx.metrics
                            .mark(&["op-set-options", "failure", "low-reserve"]);
                        return Ok(SetOptionsResult::LowReserve);
                    }
                    source.account.signers.push(*signer);
                    source.account.num_sub_entries += 1;
                }
            }
        } else if existing.is_some() {
            source.account.signers.retain(|s| s.key != signer.key);
            source.account.num_sub_entries -= 1;
        }
    }

    source.store_change(delta, ctx.store)?;
    ctx.metrics.mark(&["op-set-options", "success", "apply"]);
    Ok(SetOptionsResult::Success)
}
