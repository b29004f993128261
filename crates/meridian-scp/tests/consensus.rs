//! Slot-level consensus scenarios driven by scripted peer envelopes.

use meridian_scp::{
    companion_quorum_set_hash, federated_accept, quorum_set_hash, BallotPhase, EnvelopeState,
    LocalNode, ScpDriver, Slot, TimerId, ValidationLevel,
};
use meridian_wire::{
    Ballot, NodeId, QuorumSet, ScpEnvelope, ScpNomination, ScpStatement, ScpStatementConfirm,
    ScpStatementPledges, ScpStatementPrepare, Value,
};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

fn node(seed: u8) -> NodeId {
    NodeId([seed; 32])
}

fn value(bytes: &[u8]) -> Value {
    Value(bytes.to_vec())
}

struct TestDriver {
    qsets: HashMap<NodeId, QuorumSet>,
    emitted: Mutex<Vec<ScpEnvelope>>,
    timers: Mutex<Vec<(u64, TimerId)>>,
    cancelled: Mutex<Vec<u64>>,
    externalized: Mutex<Vec<(u64, Value)>>,
}

impl TestDriver {
    fn new(qsets: HashMap<NodeId, QuorumSet>) -> Arc<Self> {
        Arc::new(Self {
            qsets,
            emitted: Mutex::new(Vec::new()),
            timers: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            externalized: Mutex::new(Vec::new()),
        })
    }

    fn emitted_count(&self) -> usize {
        self.emitted.lock().len()
    }
}

impl ScpDriver for TestDriver {
    fn sign_statement(&self, statement: &ScpStatement) -> ScpEnvelope {
        ScpEnvelope {
            statement: statement.clone(),
            signature: vec![0xAB],
        }
    }

    fn verify_envelope(&self, _envelope: &ScpEnvelope) -> bool {
        true
    }

    fn validate_value(&self, _slot_index: u64, _value: &Value) -> ValidationLevel {
        ValidationLevel::Valid
    }

    fn combine_candidates(
        &self,
        _slot_index: u64,
        candidates: &BTreeSet<Value>,
    ) -> Option<Value> {
        candidates.iter().next_back().cloned()
    }

    fn get_quorum_set(&self, node_id: &NodeId) -> Option<QuorumSet> {
        self.qsets.get(node_id).cloned()
    }

    fn compute_hash_node(
        &self,
        slot_index: u64,
        is_priority: bool,
        round: u32,
        node_id: &NodeId,
    ) -> u64 {
        let mut h = slot_index
            .wrapping_mul(31)
            .wrapping_add(round as u64)
            .wrapping_add(is_priority as u64);
        for byte in node_id.0 {
            h = h.wrapping_mul(131).wrapping_add(byte as u64);
        }
        h
    }

    fn start_timer(&self, slot_index: u64, timer: TimerId, _delay: Duration) {
        self.timers.lock().push((slot_index, timer));
    }

    fn cancel_timers(&self, slot_index: u64) {
        self.cancelled.lock().push(slot_index);
    }

    fn emit_envelope(&self, envelope: &ScpEnvelope) {
        self.emitted.lock().push(envelope.clone());
    }

    fn value_externalized(&self, slot_index: u64, value: &Value) {
        self.externalized.lock().push((slot_index, value.clone()));
    }
}

fn three_node_setup() -> (Arc<TestDriver>, Slot<TestDriver>, QuorumSet) {
    let qset = QuorumSet::simple(2, vec![node(1), node(2), node(3)]);
    let mut qsets = HashMap::new();
    for seed in 1..=3 {
        qsets.insert(node(seed), qset.clone());
    }
    let driver = TestDriver::new(qsets);
    let local = LocalNode::new(node(1), qset.clone(), true);
    let slot = Slot::new(7, local, driver.clone());
    (driver, slot, qset)
}

fn nominate_env(qset: &QuorumSet, from: u8, votes: &[&[u8]], accepted: &[&[u8]]) -> ScpEnvelope {
    ScpEnvelope {
        statement: ScpStatement {
            node_id: node(from),
            slot_index: 7,
            pledges: ScpStatementPledges::Nominate(ScpNomination {
                quorum_set_hash: quorum_set_hash(qset),
                votes: votes.iter().map(|v| value(v)).collect(),
                accepted: accepted.iter().map(|v| value(v)).collect(),
            }),
        },
        signature: vec![],
    }
}

fn prepare_env(
    qset: &QuorumSet,
    from: u8,
    ballot: Ballot,
    prepared: Option<Ballot>,
    n_c: u32,
    n_h: u32,
) -> ScpEnvelope {
    ScpEnvelope {
        statement: ScpStatement {
            node_id: node(from),
            slot_index: 7,
            pledges: ScpStatementPledges::Prepare(ScpStatementPrepare {
                quorum_set_hash: quorum_set_hash(qset),
                ballot,
                prepared,
                prepared_prime: None,
                n_c,
                n_h,
            }),
        },
        signature: vec![],
    }
}

fn confirm_env(qset: &QuorumSet, from: u8, ballot: Ballot, n_commit: u32, n_h: u32) -> ScpEnvelope {
    ScpEnvelope {
        statement: ScpStatement {
            node_id: node(from),
            slot_index: 7,
            pledges: ScpStatementPledges::Confirm(ScpStatementConfirm {
                ballot: ballot.clone(),
                n_prepared: ballot.counter,
                n_commit,
                n_h,
                quorum_set_hash: quorum_set_hash(qset),
            }),
        },
        signature: vec![],
    }
}

/// Drive a full slot from nomination to externalize with two scripted peers.
#[test]
fn slot_externalizes_through_full_protocol() {
    let (driver, mut slot, qset) = three_node_setup();
    let v = value(b"txset-7");
    let b1 = Ballot::new(1, v.clone());

    // nominate locally, then hear matching nominations
    assert!(slot.nominate(v.clone(), &value(b"prev"), false));
    assert_eq!(
        slot.process_envelope(&nominate_env(&qset, 2, &[b"txset-7"], &[])),
        EnvelopeState::ValidNew
    );
    assert_eq!(
        slot.process_envelope(&nominate_env(&qset, 3, &[b"txset-7"], &[b"txset-7"])),
        EnvelopeState::ValidNew
    );

    // the composite seeded the ballot protocol
    assert_eq!(slot.ballot_phase(), BallotPhase::Prepare);
    assert_eq!(slot.ballot().current_ballot(), Some(&b1));
    assert!(slot.nomination().is_stopped());

    // peers vote prepare; a quorum accepts the ballot as prepared
    assert_eq!(
        slot.process_envelope(&prepare_env(&qset, 2, b1.clone(), None, 0, 0)),
        EnvelopeState::ValidNew
    );
    assert_eq!(slot.ballot().prepared(), Some(&b1));

    // peers claim it prepared; we confirm and vote to commit
    slot.process_envelope(&prepare_env(&qset, 3, b1.clone(), Some(b1.clone()), 0, 0));
    assert_eq!(slot.ballot().high_ballot(), Some(&b1));
    assert_eq!(slot.ballot().commit_ballot(), Some(&b1));

    // commit votes arrive; accept-commit moves us to Confirm
    assert_eq!(
        slot.process_envelope(&prepare_env(
            &qset,
            2,
            b1.clone(),
            Some(b1.clone()),
            1,
            1
        )),
        EnvelopeState::ValidNew
    );
    assert_eq!(slot.ballot_phase(), BallotPhase::Confirm);

    // a quorum of confirms ratifies the commit: externalize
    assert_eq!(
        slot.process_envelope(&confirm_env(&qset, 2, b1.clone(), 1, 1)),
        EnvelopeState::ValidNew
    );
    assert_eq!(slot.ballot_phase(), BallotPhase::Externalize);
    assert_eq!(slot.externalized_value(), Some(&v));
    assert_eq!(driver.externalized.lock().clone(), vec![(7, v.clone())]);
    assert!(driver.cancelled.lock().contains(&7));
}

/// Two correct nodes fed the same statements decide the same value.
#[test]
fn two_nodes_externalize_identical_values() {
    fn run_from(local_seed: u8, peer_a: u8, peer_b: u8) -> Value {
        let qset = QuorumSet::simple(2, vec![node(1), node(2), node(3)]);
        let mut qsets = HashMap::new();
        for seed in 1..=3 {
            qsets.insert(node(seed), qset.clone());
        }
        let driver = TestDriver::new(qsets);
        let local = LocalNode::new(node(local_seed), qset.clone(), true);
        let mut slot = Slot::new(7, local, driver);

        let v = value(b"txset-7");
        let b1 = Ballot::new(1, v.clone());
        slot.nominate(v, &value(b"prev"), false);
        slot.process_envelope(&nominate_env(&qset, peer_a, &[b"txset-7"], &[]));
        slot.process_envelope(&nominate_env(&qset, peer_b, &[b"txset-7"], &[b"txset-7"]));
        slot.process_envelope(&prepare_env(&qset, peer_a, b1.clone(), None, 0, 0));
        slot.process_envelope(&prepare_env(&qset, peer_b, b1.clone(), Some(b1.clone()), 0, 0));
        slot.process_envelope(&prepare_env(&qset, peer_a, b1.clone(), Some(b1.clone()), 1, 1));
        slot.process_envelope(&confirm_env(&qset, peer_a, b1, 1, 1));
        slot.externalized_value().cloned().expect("slot decided")
    }

    assert_eq!(run_from(1, 2, 3), run_from(2, 1, 3));
}

#[test]
fn externalized_slot_is_immutable() {
    let (_driver, mut slot, qset) = three_node_setup();
    let v = value(b"txset-7");
    let b1 = Ballot::new(1, v.clone());

    slot.nominate(v.clone(), &value(b"prev"), false);
    slot.process_envelope(&nominate_env(&qset, 2, &[b"txset-7"], &[]));
    slot.process_envelope(&nominate_env(&qset, 3, &[b"txset-7"], &[b"txset-7"]));
    slot.process_envelope(&prepare_env(&qset, 2, b1.clone(), None, 0, 0));
    slot.process_envelope(&prepare_env(&qset, 3, b1.clone(), Some(b1.clone()), 0, 0));
    slot.process_envelope(&prepare_env(&qset, 2, b1.clone(), Some(b1.clone()), 1, 1));
    slot.process_envelope(&confirm_env(&qset, 2, b1.clone(), 1, 1));
    assert!(slot.is_externalized());

    // an envelope for a different value is rejected, and the decided value
    // cannot move
    let conflicting = prepare_env(&qset, 3, Ballot::new(9, value(b"other")), None, 0, 0);
    assert_eq!(slot.process_envelope(&conflicting), EnvelopeState::Invalid);
    assert_eq!(slot.externalized_value(), Some(&v));

    // agreeing envelopes are still absorbed into the record
    let agreeing = confirm_env(&qset, 3, Ballot::new(1, v.clone()), 1, 1);
    assert_eq!(slot.process_envelope(&agreeing), EnvelopeState::Valid);
    assert_eq!(slot.externalized_value(), Some(&v));
}

#[test]
fn ballot_counters_are_monotone() {
    let (_driver, mut slot, qset) = three_node_setup();
    let v = value(b"txset-7");

    slot.nominate(v.clone(), &value(b"prev"), false);
    slot.process_envelope(&nominate_env(&qset, 2, &[b"txset-7"], &[]));
    slot.process_envelope(&nominate_env(&qset, 3, &[b"txset-7"], &[b"txset-7"]));

    let mut counters = Vec::new();
    counters.push(slot.ballot().current_ballot().unwrap().counter);
    for _ in 0..4 {
        slot.on_timer(TimerId::BallotProtocol);
        counters.push(slot.ballot().current_ballot().unwrap().counter);
    }
    assert!(counters.windows(2).all(|w| w[0] <= w[1]));
    assert!(counters.last().unwrap() > &counters[0]);
}

#[test]
fn statement_history_is_append_only() {
    let (_driver, mut slot, qset) = three_node_setup();

    assert_eq!(slot.statement_count(), 0);
    slot.process_envelope(&nominate_env(&qset, 2, &[b"a"], &[]));
    assert_eq!(slot.statement_count(), 1);

    // even a stale duplicate is recorded
    slot.process_envelope(&nominate_env(&qset, 2, &[b"a"], &[]));
    assert_eq!(slot.statement_count(), 2);

    slot.process_envelope(&nominate_env(&qset, 3, &[b"a", b"b"], &[]));
    assert_eq!(slot.statement_count(), 3);
}

#[test]
fn wrong_slot_envelope_rejected() {
    let (_driver, mut slot, qset) = three_node_setup();
    let mut envelope = nominate_env(&qset, 2, &[b"a"], &[]);
    envelope.statement.slot_index = 8;
    assert_eq!(slot.process_envelope(&envelope), EnvelopeState::Invalid);
    assert_eq!(slot.statement_count(), 0);
}

#[test]
fn duplicate_envelope_does_not_reemit() {
    let (driver, mut slot, qset) = three_node_setup();
    slot.nominate(value(b"a"), &value(b"prev"), false);
    let baseline = driver.emitted_count();

    let envelope = nominate_env(&qset, 2, &[b"a"], &[]);
    slot.process_envelope(&envelope);
    let after_first = driver.emitted_count();

    // same envelope again: valid, but no new statement goes out
    assert_eq!(slot.process_envelope(&envelope), EnvelopeState::Valid);
    assert_eq!(driver.emitted_count(), after_first);
    assert!(after_first >= baseline);
}

/// Under a threshold-3-of-3 quorum set, two accepting nodes form a
/// v-blocking set, so federated accept succeeds without any full quorum
/// voting.
#[test]
fn federated_accept_via_v_blocking() {
    let qset = QuorumSet::simple(3, vec![node(1), node(2), node(3)]);
    let local = LocalNode::new(node(1), qset.clone(), true);
    let ballot = Ballot::new(1, value(b"v"));

    let accepted_statement = |from: u8| ScpStatement {
        node_id: node(from),
        slot_index: 7,
        pledges: ScpStatementPledges::Prepare(ScpStatementPrepare {
            quorum_set_hash: quorum_set_hash(&qset),
            ballot: ballot.clone(),
            prepared: Some(ballot.clone()),
            prepared_prime: None,
            n_c: 0,
            n_h: 0,
        }),
    };

    let mut statements = HashMap::new();
    statements.insert(node(1), accepted_statement(1));
    statements.insert(node(2), accepted_statement(2));

    let accepts = |st: &ScpStatement| match &st.pledges {
        ScpStatementPledges::Prepare(p) => p.prepared.is_some(),
        _ => false,
    };
    let votes = |_: &ScpStatement| false;
    let get_qs = |_: &NodeId| Some(qset.clone());

    // no quorum voted (we never see node 3), yet the v-blocking set of
    // acceptors forces acceptance
    assert!(federated_accept(
        &votes,
        &accepts,
        &statements,
        &local,
        &get_qs
    ));

    // negative case: under a 2-of-3 set a single acceptor is not
    // v-blocking, and one vote is no quorum
    let loose = QuorumSet::simple(2, vec![node(1), node(2), node(3)]);
    let loose_local = LocalNode::new(node(1), loose, true);
    let mut one = HashMap::new();
    one.insert(node(2), accepted_statement(2));
    assert!(!federated_accept(&votes, &accepts, &one, &loose_local, &get_qs));
}

#[test]
fn companion_hash_follows_statement_kind() {
    let qset = QuorumSet::simple(2, vec![node(1), node(2), node(3)]);
    let nominate = nominate_env(&qset, 2, &[b"a"], &[]);
    assert_eq!(
        companion_quorum_set_hash(&nominate.statement),
        quorum_set_hash(&qset)
    );

    let externalize = ScpStatement {
        node_id: node(2),
        slot_index: 7,
        pledges: ScpStatementPledges::Externalize(
            meridian_wire::ScpStatementExternalize {
                commit: Ballot::new(1, value(b"v")),
                n_h: 1,
                commit_quorum_set_hash: quorum_set_hash(&qset),
            },
        ),
    };
    assert_eq!(
        companion_quorum_set_hash(&externalize),
        quorum_set_hash(&qset)
    );
}

#[test]
fn non_validator_tracks_but_does_not_emit() {
    let qset = QuorumSet::simple(2, vec![node(1), node(2), node(3)]);
    let mut qsets = HashMap::new();
    for seed in 1..=3 {
        qsets.insert(node(seed), qset.clone());
    }
    let driver = TestDriver::new(qsets);
    // node 9 watches without being in anyone's quorum set
    let local = LocalNode::new(node(9), qset.clone(), false);
    let mut slot = Slot::new(7, local, driver.clone());

    assert!(!slot.nominate(value(b"a"), &value(b"prev"), false));
    slot.process_envelope(&nominate_env(&qset, 2, &[b"a"], &[]));
    slot.process_envelope(&nominate_env(&qset, 3, &[b"a"], &[]));
    assert_eq!(driver.emitted_count(), 0);
}
