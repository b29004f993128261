//! CreateAccount: fund a new account from the operation source.

use crate::state::AccountFrame;
use crate::{OpContext, Result};
use meridian_ledger::LedgerDelta;
use meridian_wire::{AccountEntry, CreateAccountOp, CreateAccountResult};

pub(super) fn check_valid(op: &CreateAccountOp) -> Option<CreateAccountResult> {
    if op.starting_balance <= 0 {
        return Some(CreateAccountResult::Malformed);
    }
    None
}

pub(super) fn apply(
    op: &CreateAccountOp,
    source: &mut AccountFrame,
    delta: &mut LedgerDelta<'_>,
    ctx: &OpContext<'_>,
) -> Result<CreateAccountResult> {
    if AccountFrame::load(ctx.store, &op.destination)?.is_some() {
        ctx.metrics
            .mark(&["op-create-account", "failure", "already-exists"]);
        return Ok(CreateAccountResult::AlreadyExists);
    }

    let header = delta.header().clone();
    // a fresh account has two base reserves worth of minimum balance
    if op.starting_balance < 2 * header.base_reserve as i64 {
        ctx.metrics
            .mark(&["op-create-account", "failure", "low-reserve"]);
        return Ok(CreateAccountResult::LowReserve);
    }
    if source.account.balance - op.starting_balance < source.account.min_balance(&header) {
        ctx.metrics
            .mark(&["op-create-account", "failure", "underfunded"]);
        return Ok(CreateAccountResult::Underfunded);
    }

    source.account.balance -= op.starting_balance;
    source.store_change(delta, ctx.store)?;

    let mut created = AccountEntry::new(op.destination, op.starting_balance);
    // starting sequence numbers are namespaced by the creating ledger
    created.seq_num = (header.ledger_seq as i64) << 32;
    AccountFrame::new(created).store_add(delta, ctx.store)?;

    ctx.metrics
        .mark(&["op-create-account", "success", "apply"]);
    Ok(CreateAccountResult::Success)
}
