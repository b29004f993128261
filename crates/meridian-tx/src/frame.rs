//! Transaction frame: a signed envelope and its application machinery.

use crate::operations::{self, OperationFrame};
use crate::signature_checker::SignatureChecker;
use crate::state::AccountFrame;
use crate::{OpContext, Result, TxError};
use meridian_common::{Hash256, NetworkId};
use meridian_crypto::sha256;
use meridian_ledger::{EntryChange, LedgerDelta};
use meridian_store::EntryStore;
use meridian_wire::{
    canonical_bytes, AccountId, LedgerHeader, Operation, TransactionEnvelope, TransactionResult,
    TransactionResultCode,
};
use tracing::debug;

/// A transaction envelope in its exploded form: hashes precomputed, ready
/// for validation and application.
#[derive(Debug, Clone)]
pub struct TransactionFrame {
    envelope: TransactionEnvelope,
    /// Digest over the network id and the transaction body; what gets signed.
    contents_hash: Hash256,
    /// Digest additionally covering the signatures.
    full_hash: Hash256,
}

/// Outcome of applying one transaction: the result tree plus the change
/// list each operation produced (empty for operations that did not run or
/// were rolled back).
#[derive(Debug, Clone)]
pub struct TransactionApply {
    pub result: TransactionResult,
    pub op_changes: Vec<Vec<EntryChange>>,
}

impl TransactionApply {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

impl TransactionFrame {
    /// Build a frame from a wire envelope, binding it to a network.
    pub fn new(network_id: NetworkId, envelope: TransactionEnvelope) -> Self {
        let body = canonical_bytes(&envelope.tx);
        let contents_hash = Hash256::hash_parts(&[network_id.as_bytes(), &body]);
        let signatures = canonical_bytes(&envelope.signatures);
        let full_hash = Hash256::hash_parts(&[network_id.as_bytes(), &body, &signatures]);
        Self {
            envelope,
            contents_hash,
            full_hash,
        }
    }

    /// The hash the signatures are over.
    pub fn contents_hash(&self) -> Hash256 {
        self.contents_hash
    }

    /// The hash covering contents and signatures.
    pub fn full_hash(&self) -> Hash256 {
        self.full_hash
    }

    pub fn envelope(&self) -> &TransactionEnvelope {
        &self.envelope
    }

    pub fn source_id(&self) -> AccountId {
        self.envelope.tx.source_account
    }

    pub fn seq_num(&self) -> i64 {
        self.envelope.tx.seq_num
    }

    pub fn fee(&self) -> u32 {
        self.envelope.tx.fee
    }

    pub fn operations(&self) -> &[Operation] {
        &self.envelope.tx.operations
    }

    /// Minimum fee for this transaction under the given header.
    pub fn min_fee(&self, header: &LedgerHeader) -> i64 {
        let count = self.operations().len().max(1) as i64;
        header.base_fee as i64 * count
    }

    /// Shared front half of validation and application.
    ///
    /// Sets a failure code on `result` and returns false when the envelope
    /// cannot proceed. The sequence check only runs when validating: during
    /// application the sequence was already consumed by `process_fee_seq`.
    fn common_valid(
        &self,
        checker: &mut SignatureChecker<'_>,
        ctx: &OpContext<'_>,
        header: &LedgerHeader,
        applying: bool,
        current_seq: i64,
        result: &mut TransactionResult,
    ) -> Result<bool> {
        if self.operations().is_empty() {
            ctx.metrics
                .mark(&["transaction", "invalid", "missing-operation"]);
            result.code = TransactionResultCode::MissingOperation;
            return Ok(false);
        }

        if let Some(bounds) = &self.envelope.tx.time_bounds {
            if bounds.min_time > header.close_time {
                ctx.metrics.mark(&["transaction", "invalid", "too-early"]);
                result.code = TransactionResultCode::TooEarly;
                return Ok(false);
            }
            if bounds.max_time != 0 && bounds.max_time < header.close_time {
                ctx.metrics.mark(&["transaction", "invalid", "too-late"]);
                result.code = TransactionResultCode::TooLate;
                return Ok(false);
            }
        }

        if (self.fee() as i64) < self.min_fee(header) {
            ctx.metrics
                .mark(&["transaction", "invalid", "insufficient-fee"]);
            result.code = TransactionResultCode::InsufficientFee;
            return Ok(false);
        }

        let Some(source) = AccountFrame::load(ctx.store, &self.source_id())? else {
            ctx.metrics.mark(&["transaction", "invalid", "no-account"]);
            result.code = TransactionResultCode::NoAccount;
            return Ok(false);
        };

        if !applying {
            let current = if current_seq == 0 {
                source.account.seq_num
            } else {
                current_seq
            };
            if current + 1 != self.seq_num() {
                ctx.metrics.mark(&["transaction", "invalid", "bad-seq"]);
                result.code = TransactionResultCode::BadSeq;
                return Ok(false);
            }
        }

        if !checker.check_signature(
            &source.account.signers_with_master(),
            source.account.thresholds.low(),
        ) {
            ctx.metrics.mark(&["transaction", "invalid", "bad-auth"]);
            result.code = TransactionResultCode::BadAuth;
            return Ok(false);
        }

        if source.account.balance - (self.fee() as i64) < source.account.min_balance(header) {
            ctx.metrics
                .mark(&["transaction", "invalid", "insufficient-balance"]);
            result.code = TransactionResultCode::InsufficientBalance;
            return Ok(false);
        }

        Ok(true)
    }

    /// Validate the envelope against current state without applying it.
    ///
    /// `current_seq` of zero means "read it from the source account".
    pub fn check_valid(
        &self,
        ctx: &OpContext<'_>,
        header: &LedgerHeader,
        current_seq: i64,
    ) -> Result<TransactionResult> {
        let mut result = TransactionResult::new(self.fee() as i64, self.operations().len());
        let mut checker = SignatureChecker::new(self.contents_hash, &self.envelope.signatures);

        if !self.common_valid(&mut checker, ctx, header, false, current_seq, &mut result)? {
            return Ok(result);
        }

        for (index, op) in self.operations().iter().enumerate() {
            let frame = OperationFrame::new(op, self.source_id());
            if let Some(invalid) = frame.check_valid(&mut checker, ctx)? {
                // fast fail; the envelope is only as good as its worst op
                result.op_results[index] = invalid;
                result.code = TransactionResultCode::Failed;
                return Ok(result);
            }
        }

        if !checker.all_signatures_used() {
            ctx.metrics
                .mark(&["transaction", "invalid", "bad-auth-extra"]);
            result.code = TransactionResultCode::BadAuth;
        }
        Ok(result)
    }

    /// Debit the fee and consume the sequence number.
    ///
    /// Runs before any operation applies and is committed separately, so
    /// the debit survives operation failure. Returns the fee actually
    /// charged (capped at the source's balance).
    pub fn process_fee_seq(
        &self,
        delta: &mut LedgerDelta<'_>,
        store: &dyn EntryStore,
    ) -> Result<i64> {
        let Some(mut source) = AccountFrame::load(store, &self.source_id())? else {
            return Err(TxError::UnexpectedState(
                "fee debit for missing source account".into(),
            ));
        };

        let mut fee = self.fee() as i64;
        if fee > source.account.balance {
            // take what is there rather than overdraw
            fee = source.account.balance;
        }
        if fee > 0 {
            source.account.balance -= fee;
            delta.header_mut()?.fee_pool += fee;
        }

        if source.account.seq_num + 1 != self.seq_num() {
            // the transaction set is sanitized for sequence numbers upstream
            return Err(TxError::UnexpectedState(format!(
                "sequence gap for {:?}: have {}, envelope {}",
                self.source_id(),
                source.account.seq_num,
                self.seq_num()
            )));
        }
        source.account.seq_num = self.seq_num();
        source.store_change(delta, store)?;
        Ok(fee)
    }

    /// Apply the envelope as an atomic sequence of operations.
    ///
    /// Opens a transaction-level delta inside `delta`; each operation runs
    /// in its own delta nested inside that. A failing operation rolls its
    /// delta back and skips the rest; the transaction delta then rolls back
    /// too, so a failed transaction leaves nothing behind but the fee debit
    /// recorded by [`process_fee_seq`].
    pub fn apply(&self, delta: &mut LedgerDelta<'_>, ctx: &OpContext<'_>) -> Result<TransactionApply> {
        let op_count = self.operations().len();
        let mut result = TransactionResult::new(self.fee() as i64, op_count);
        let mut op_changes: Vec<Vec<EntryChange>> = vec![Vec::new(); op_count];
        let mut checker = SignatureChecker::new(self.contents_hash, &self.envelope.signatures);

        if !self.common_valid(&mut checker, ctx, delta.header(), true, 0, &mut result)? {
            return Ok(TransactionApply { result, op_changes });
        }

        let mut failed = false;
        {
            let mut tx_delta = LedgerDelta::open(delta)?;
            for (index, op) in self.operations().iter().enumerate() {
                let frame = OperationFrame::new(op, self.source_id());
                let mut op_delta = LedgerDelta::open(&mut tx_delta)?;
                let op_result = frame.apply(&mut checker, &mut op_delta, ctx)?;
                let succeeded = operations::is_success(&op_result);
                result.op_results[index] = op_result;

                if succeeded {
                    op_changes[index] = op_delta.get_changes();
                    op_delta.commit()?;
                } else {
                    op_delta.rollback()?;
                    failed = true;
                    break;
                }
            }

            if !failed && !checker.all_signatures_used() {
                ctx.metrics
                    .mark(&["transaction", "invalid", "bad-auth-extra"]);
                result.code = TransactionResultCode::BadAuth;
                failed = true;
            }

            if failed {
                tx_delta.rollback()?;
            } else {
                tx_delta.commit()?;
            }
        }

        if failed {
            if result.code == TransactionResultCode::Success {
                result.code = TransactionResultCode::Failed;
            }
            for changes in &mut op_changes {
                changes.clear();
            }
            debug!(
                tx = %self.contents_hash,
                code = ?result.code,
                "transaction failed"
            );
        }

        Ok(TransactionApply { result, op_changes })
    }
}

/// Sign helper for constructing envelopes in tests and tooling: computes
/// the contents hash a signer must cover.
pub fn contents_hash_for(network_id: &NetworkId, envelope: &TransactionEnvelope) -> Hash256 {
    let body = canonical_bytes(&envelope.tx);
    Hash256::hash_parts(&[network_id.as_bytes(), &body])
}

/// Digest of a canonical header, used to chain ledgers.
pub fn header_hash(header: &LedgerHeader) -> Hash256 {
    sha256(&canonical_bytes(header))
}
