//! Ledger close driver: apply an externalized transaction set.
//!
//! Once consensus externalizes a value, the enclosing driver decodes it
//! into an ordered transaction set and runs it through here: one root delta
//! for the ledger, a fee delta and a transaction delta per envelope, and a
//! change log emitted at the end for history and replay.

use crate::frame::{header_hash, TransactionApply, TransactionFrame};
use crate::{OpContext, Result, TxError};
use meridian_common::{Hash256, Metrics, NetworkId};
use meridian_ledger::{mark_meters, EntryChange, LedgerDelta};
use meridian_store::EntryStore;
use meridian_wire::{LedgerHeader, TransactionEnvelope, TransactionResult};
use tracing::{debug, info};

/// Flags recognized by the apply path.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyConfig {
    /// Re-check every committed delta against the store. Expensive; meant
    /// for catching state divergence during development and audits.
    pub paranoid_mode: bool,
}

/// The externalized inputs for one ledger close.
#[derive(Debug, Clone)]
pub struct LedgerCloseData {
    pub close_time: u64,
    pub tx_set_hash: Hash256,
    pub transactions: Vec<TransactionEnvelope>,
}

/// A transaction's content hash paired with its result, as archived.
#[derive(Debug, Clone)]
pub struct TransactionResultPair {
    pub transaction_hash: Hash256,
    pub result: TransactionResult,
}

/// Everything a ledger close produces.
#[derive(Debug, Clone)]
pub struct LedgerCloseResult {
    pub results: Vec<TransactionResultPair>,
    /// Per-transaction change list from fee processing; persisted even when
    /// the transaction itself failed.
    pub fee_changes: Vec<Vec<EntryChange>>,
    /// Per-transaction, per-operation change lists.
    pub tx_changes: Vec<Vec<Vec<EntryChange>>>,
    /// The ledger-wide minimal change list.
    pub changes: Vec<EntryChange>,
}

/// Apply a transaction set on top of `header`, materializing into `store`.
pub fn close_ledger(
    header: &mut LedgerHeader,
    store: &dyn EntryStore,
    data: LedgerCloseData,
    network_id: NetworkId,
    config: &ApplyConfig,
    metrics: &dyn Metrics,
) -> Result<LedgerCloseResult> {
    let previous_hash = header_hash(header);
    let mut root = LedgerDelta::open_root(header, store);
    {
        let working = root.header_mut()?;
        working.ledger_seq += 1;
        working.previous_ledger_hash = previous_hash;
        working.close_time = data.close_time;
        working.tx_set_hash = data.tx_set_hash;
    }

    let ctx = OpContext { store, metrics };
    let mut results = Vec::with_capacity(data.transactions.len());
    let mut fee_changes = Vec::with_capacity(data.transactions.len());
    let mut tx_changes = Vec::with_capacity(data.transactions.len());

    for envelope in data.transactions {
        let frame = TransactionFrame::new(network_id, envelope);

        // fees and sequence numbers are consumed up front, in their own
        // delta, so operation failure cannot revert them
        let fee_charged;
        {
            let mut fee_delta = LedgerDelta::open(&mut root)?;
            fee_charged = frame.process_fee_seq(&mut fee_delta, store)?;
            fee_changes.push(fee_delta.get_changes());
            fee_delta.commit()?;
            if config.paranoid_mode {
                fee_delta.check_against_store(store).map_err(TxError::from)?;
            }
        }

        let TransactionApply {
            mut result,
            op_changes,
        } = frame.apply(&mut root, &ctx)?;
        result.fee_charged = fee_charged;

        if config.paranoid_mode {
            root.check_against_store(store).map_err(TxError::from)?;
        }

        debug!(tx = %frame.contents_hash(), code = ?result.code, "transaction applied");
        tx_changes.push(op_changes);
        results.push(TransactionResultPair {
            transaction_hash: frame.contents_hash(),
            result,
        });
    }

    let changes = root.get_changes();
    mark_meters(&changes, metrics);
    let closed_seq = root.header().ledger_seq;
    root.commit()?;
    if config.paranoid_mode {
        root.check_against_store(store).map_err(TxError::from)?;
    }

    info!(
        ledger_seq = closed_seq,
        tx_count = results.len(),
        change_count = changes.len(),
        "ledger closed"
    );

    Ok(LedgerCloseResult {
        results,
        fee_changes,
        tx_changes,
        changes,
    })
}
