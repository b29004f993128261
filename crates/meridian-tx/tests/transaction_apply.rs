//! End-to-end transaction application scenarios.

use ed25519_dalek::{Signer as _, SigningKey};
use meridian_common::{NetworkId, NoopMetrics};
use meridian_store::{EntryStore, MemoryStore};
use meridian_tx::{
    close_ledger, contents_hash_for, ApplyConfig, LedgerCloseData, OpContext, TransactionFrame,
};
use meridian_wire::{
    AccountEntry, AccountId, AccountMergeOp, AccountMergeResult, Asset, DecoratedSignature,
    LedgerEntry, LedgerEntryData, LedgerHeader, LedgerKey, Operation, OperationBody,
    OperationResult, OperationResultTr, PaymentOp, PaymentResult, Transaction,
    TransactionEnvelope, TransactionResultCode, TrustLineEntry, TRUSTLINE_AUTHORIZED_FLAG,
};

fn network() -> NetworkId {
    NetworkId::testnet()
}

fn keypair(seed: u8) -> (SigningKey, AccountId) {
    let signing = SigningKey::from_bytes(&[seed; 32]);
    let id = AccountId(signing.verifying_key().to_bytes());
    (signing, id)
}

fn test_header() -> LedgerHeader {
    LedgerHeader {
        base_fee: 10,
        base_reserve: 10,
        ..LedgerHeader::default()
    }
}

fn seed_account(store: &MemoryStore, id: AccountId, balance: i64) {
    store.seed(LedgerEntry::account(AccountEntry::new(id, balance)));
}

fn load_account(store: &MemoryStore, id: AccountId) -> Option<AccountEntry> {
    match store.load(&LedgerKey::Account { account_id: id }).unwrap() {
        Some(LedgerEntry {
            data: LedgerEntryData::Account(account),
            ..
        }) => Some(account),
        _ => None,
    }
}

fn envelope(
    keys: &[&SigningKey],
    source: AccountId,
    seq: i64,
    fee: u32,
    operations: Vec<Operation>,
) -> TransactionEnvelope {
    let tx = Transaction {
        source_account: source,
        fee,
        seq_num: seq,
        time_bounds: None,
        operations,
    };
    let mut env = TransactionEnvelope {
        tx,
        signatures: Vec::new(),
    };
    let hash = contents_hash_for(&network(), &env);
    for key in keys {
        let id = AccountId(key.verifying_key().to_bytes());
        env.signatures.push(DecoratedSignature {
            hint: id.hint(),
            signature: key.sign(hash.as_bytes()).to_bytes().to_vec(),
        });
    }
    env
}

fn op(body: OperationBody) -> Operation {
    Operation {
        source_account: None,
        body,
    }
}

fn close(
    store: &MemoryStore,
    header: &mut LedgerHeader,
    transactions: Vec<TransactionEnvelope>,
) -> meridian_tx::LedgerCloseResult {
    close_ledger(
        header,
        store,
        LedgerCloseData {
            close_time: header.close_time,
            tx_set_hash: Default::default(),
            transactions,
        },
        network(),
        &ApplyConfig { paranoid_mode: true },
        &NoopMetrics,
    )
    .unwrap()
}

#[test]
fn merge_with_trustline_balance_fails_has_credit() {
    let store = MemoryStore::new();
    let (key_s, s) = keypair(1);
    let (_, d) = keypair(2);
    let (_, issuer) = keypair(3);

    seed_account(&store, s, 1000);
    seed_account(&store, d, 200);
    seed_account(&store, issuer, 1000);
    store.seed(LedgerEntry::trustline(TrustLineEntry {
        account_id: s,
        asset: Asset::credit(*b"USD\0", issuer),
        balance: 1,
        limit: 100,
        flags: TRUSTLINE_AUTHORIZED_FLAG,
    }));

    let mut header = test_header();
    let result = close(
        &store,
        &mut header,
        vec![envelope(
            &[&key_s],
            s,
            1,
            10,
            vec![op(OperationBody::AccountMerge(AccountMergeOp {
                destination: d,
            }))],
        )],
    );

    let tx_result = &result.results[0].result;
    assert_eq!(tx_result.code, TransactionResultCode::Failed);
    assert_eq!(
        tx_result.op_results[0],
        OperationResult::Inner(OperationResultTr::AccountMerge(
            AccountMergeResult::HasCredit
        ))
    );

    // source and its trustline survive; only the fee moved
    let source = load_account(&store, s).unwrap();
    assert_eq!(source.balance, 990);
    assert_eq!(source.seq_num, 1);
    assert!(store
        .exists(&LedgerKey::Trustline {
            account_id: s,
            asset: Asset::credit(*b"USD\0", issuer),
        })
        .unwrap());
    assert_eq!(load_account(&store, d).unwrap().balance, 200);
}

#[test]
fn merge_moves_balance_and_deletes_source() {
    let store = MemoryStore::new();
    let (key_s, s) = keypair(1);
    let (_, d) = keypair(2);

    seed_account(&store, s, 1000);
    seed_account(&store, d, 200);

    let mut header = test_header();
    let result = close(
        &store,
        &mut header,
        vec![envelope(
            &[&key_s],
            s,
            1,
            10,
            vec![op(OperationBody::AccountMerge(AccountMergeOp {
                destination: d,
            }))],
        )],
    );

    // the fee is debited before the merge moves what is left
    let tx_result = &result.results[0].result;
    assert_eq!(tx_result.code, TransactionResultCode::Success);
    assert_eq!(
        tx_result.op_results[0],
        OperationResult::Inner(OperationResultTr::AccountMerge(
            AccountMergeResult::Success {
                source_account_balance: 990
            }
        ))
    );

    assert!(load_account(&store, s).is_none());
    assert_eq!(load_account(&store, d).unwrap().balance, 1190);
    assert_eq!(header.fee_pool, 10);
}

#[test]
fn merge_by_issuer_fails_credit_held() {
    let store = MemoryStore::new();
    let (key_i, issuer) = keypair(1);
    let (_, d) = keypair(2);
    let (_, holder) = keypair(3);

    seed_account(&store, issuer, 1000);
    seed_account(&store, d, 200);
    seed_account(&store, holder, 1000);
    store.seed(LedgerEntry::trustline(TrustLineEntry {
        account_id: holder,
        asset: Asset::credit(*b"EUR\0", issuer),
        balance: 0,
        limit: 100,
        flags: TRUSTLINE_AUTHORIZED_FLAG,
    }));

    let mut header = test_header();
    let result = close(
        &store,
        &mut header,
        vec![envelope(
            &[&key_i],
            issuer,
            1,
            10,
            vec![op(OperationBody::AccountMerge(AccountMergeOp {
                destination: d,
            }))],
        )],
    );

    assert_eq!(
        result.results[0].result.op_results[0],
        OperationResult::Inner(OperationResultTr::AccountMerge(
            AccountMergeResult::CreditHeld
        ))
    );
    assert!(load_account(&store, issuer).is_some());
}

#[test]
fn failed_operation_rolls_back_but_fee_sticks() {
    let store = MemoryStore::new();
    let (key_s, s) = keypair(1);
    let (_, d) = keypair(2);
    let (_, missing) = keypair(9);

    seed_account(&store, s, 1000);
    seed_account(&store, d, 200);

    let mut header = test_header();
    let result = close(
        &store,
        &mut header,
        vec![envelope(
            &[&key_s],
            s,
            1,
            20,
            vec![
                op(OperationBody::Payment(PaymentOp {
                    destination: d,
                    asset: Asset::Native,
                    amount: 100,
                })),
                op(OperationBody::Payment(PaymentOp {
                    destination: missing,
                    asset: Asset::Native,
                    amount: 50,
                })),
            ],
        )],
    );

    let tx_result = &result.results[0].result;
    assert_eq!(tx_result.code, TransactionResultCode::Failed);
    assert_eq!(
        tx_result.op_results[0],
        OperationResult::Inner(OperationResultTr::Payment(PaymentResult::Success))
    );
    assert_eq!(
        tx_result.op_results[1],
        OperationResult::Inner(OperationResultTr::Payment(PaymentResult::NoDestination))
    );
    assert_eq!(tx_result.fee_charged, 20);

    // the first payment was rolled back with the transaction
    let source = load_account(&store, s).unwrap();
    assert_eq!(source.balance, 980);
    assert_eq!(source.seq_num, 1);
    assert_eq!(load_account(&store, d).unwrap().balance, 200);

    // fee changes were emitted even though the transaction failed
    assert_eq!(result.fee_changes.len(), 1);
    assert!(!result.fee_changes[0].is_empty());
    // no operation changes survive
    assert!(result.tx_changes[0].iter().all(|c| c.is_empty()));

    // the ledger change log holds exactly the fee debit
    assert_eq!(result.changes.len(), 1);
}

#[test]
fn unused_signature_fails_bad_auth() {
    let store = MemoryStore::new();
    let (key_s, s) = keypair(1);
    let (key_other, _) = keypair(7);
    let (_, d) = keypair(2);

    seed_account(&store, s, 1000);
    seed_account(&store, d, 200);

    let mut header = test_header();
    let result = close(
        &store,
        &mut header,
        vec![envelope(
            &[&key_s, &key_other],
            s,
            1,
            10,
            vec![op(OperationBody::Payment(PaymentOp {
                destination: d,
                asset: Asset::Native,
                amount: 100,
            }))],
        )],
    );

    let tx_result = &result.results[0].result;
    assert_eq!(tx_result.code, TransactionResultCode::BadAuth);
    // the payment itself would have succeeded
    assert_eq!(
        tx_result.op_results[0],
        OperationResult::Inner(OperationResultTr::Payment(PaymentResult::Success))
    );
    assert_eq!(load_account(&store, d).unwrap().balance, 200);
    assert_eq!(load_account(&store, s).unwrap().balance, 990);
}

#[test]
fn sequential_transactions_see_each_others_effects() {
    let store = MemoryStore::new();
    let (key_s, s) = keypair(1);
    let (_, d) = keypair(2);

    seed_account(&store, s, 10_000);
    seed_account(&store, d, 200);

    let pay = |seq: i64, amount: i64| {
        envelope(
            &[&key_s],
            s,
            seq,
            10,
            vec![op(OperationBody::Payment(PaymentOp {
                destination: d,
                asset: Asset::Native,
                amount,
            }))],
        )
    };

    let mut header = test_header();
    let result = close(&store, &mut header, vec![pay(1, 100), pay(2, 300)]);

    assert!(result.results.iter().all(|r| r.result.is_success()));
    assert_eq!(load_account(&store, s).unwrap().balance, 10_000 - 20 - 400);
    assert_eq!(load_account(&store, d).unwrap().balance, 600);
    assert_eq!(load_account(&store, s).unwrap().seq_num, 2);
    assert_eq!(header.fee_pool, 20);
    assert_eq!(header.ledger_seq, 2);
}

#[test]
fn check_valid_rejects_bad_seq_and_low_fee() {
    let store = MemoryStore::new();
    let (key_s, s) = keypair(1);
    let (_, d) = keypair(2);
    seed_account(&store, s, 1000);
    seed_account(&store, d, 200);

    let header = test_header();
    let ctx = OpContext {
        store: &store,
        metrics: &NoopMetrics,
    };

    let pay = op(OperationBody::Payment(PaymentOp {
        destination: d,
        asset: Asset::Native,
        amount: 100,
    }));

    let bad_seq = TransactionFrame::new(network(), envelope(&[&key_s], s, 5, 10, vec![pay.clone()]));
    let result = bad_seq.check_valid(&ctx, &header, 0).unwrap();
    assert_eq!(result.code, TransactionResultCode::BadSeq);

    let low_fee = TransactionFrame::new(network(), envelope(&[&key_s], s, 1, 1, vec![pay]));
    let result = low_fee.check_valid(&ctx, &header, 0).unwrap();
    assert_eq!(result.code, TransactionResultCode::InsufficientFee);
}

#[test]
fn check_valid_accepts_well_formed_envelope() {
    let store = MemoryStore::new();
    let (key_s, s) = keypair(1);
    let (_, d) = keypair(2);
    seed_account(&store, s, 1000);
    seed_account(&store, d, 200);

    let header = test_header();
    let ctx = OpContext {
        store: &store,
        metrics: &NoopMetrics,
    };

    let frame = TransactionFrame::new(
        network(),
        envelope(
            &[&key_s],
            s,
            1,
            10,
            vec![op(OperationBody::Payment(PaymentOp {
                destination: d,
                asset: Asset::Native,
                amount: 100,
            }))],
        ),
    );
    let result = frame.check_valid(&ctx, &header, 0).unwrap();
    assert_eq!(result.code, TransactionResultCode::Success);

    // hashes are stable and network-bound
    assert_eq!(frame.contents_hash(), frame.contents_hash());
    let other_net = TransactionFrame::new(NetworkId::mainnet(), frame.envelope().clone());
    assert_ne!(frame.contents_hash(), other_net.contents_hash());
    assert_ne!(frame.contents_hash(), frame.full_hash());
}
