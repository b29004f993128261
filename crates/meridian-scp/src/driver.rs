//! Driver trait: the callbacks SCP makes into the application layer.
//!
//! SCP itself is a pure state machine. Everything that touches keys, the
//! network, value semantics or the clock goes through [`ScpDriver`], which
//! the enclosing node (the herder) implements.

use meridian_wire::{NodeId, QuorumSet, ScpEnvelope, ScpStatement, Value};
use std::collections::BTreeSet;
use std::time::Duration;

/// Validation level for SCP values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    /// Reject: never vote for or accept this value.
    Invalid,
    /// Usable during nomination, but needs full validation before commit.
    MaybeValid,
    /// Fully validated.
    Valid,
}

/// Named per-slot timers.
///
/// Scheduling a timer replaces any earlier timer with the same id for that
/// slot; dropping a slot cancels both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    Nomination,
    BallotProtocol,
}

/// Callback interface between the consensus core and its surroundings.
pub trait ScpDriver: Send + Sync {
    /// Wrap a statement in a signed envelope.
    fn sign_statement(&self, statement: &ScpStatement) -> ScpEnvelope;

    /// Verify an incoming envelope's signature.
    fn verify_envelope(&self, envelope: &ScpEnvelope) -> bool;

    /// Judge a value for this slot.
    fn validate_value(&self, slot_index: u64, value: &Value) -> ValidationLevel;

    /// Combine accepted candidates into the composite value a ballot will
    /// carry. Must be deterministic across nodes.
    fn combine_candidates(&self, slot_index: u64, candidates: &BTreeSet<Value>) -> Option<Value>;

    /// Look up a node's declared quorum set.
    fn get_quorum_set(&self, node_id: &NodeId) -> Option<QuorumSet>;

    /// Deterministic per-round node hash used for nomination leader
    /// election (`is_priority` selects the priority or neighborhood hash).
    fn compute_hash_node(
        &self,
        slot_index: u64,
        is_priority: bool,
        round: u32,
        node_id: &NodeId,
    ) -> u64;

    /// How long a round's timer should run. Grows with the round so an
    /// unstable network gets more time to converge.
    fn compute_timeout(&self, round: u32, _timer: TimerId) -> Duration {
        Duration::from_secs((round as u64 + 1).min(30))
    }

    /// Schedule a named timer for a slot, replacing any prior timer with
    /// the same id. The driver calls `Slot::on_timer` when it fires.
    fn start_timer(&self, slot_index: u64, timer: TimerId, delay: Duration);

    /// Cancel every timer for a slot.
    fn cancel_timers(&self, slot_index: u64);

    /// Broadcast an envelope to peers.
    fn emit_envelope(&self, envelope: &ScpEnvelope);

    /// We started voting to nominate `value`.
    fn nominating_value(&self, _slot_index: u64, _value: &Value) {}

    /// A ballot was accepted as prepared.
    fn accepted_ballot_prepared(&self, _slot_index: u64, _counter: u32, _value: &Value) {}

    /// A commit was accepted.
    fn accepted_commit(&self, _slot_index: u64, _counter: u32, _value: &Value) {}

    /// We heard from a quorum for the current ballot.
    fn ballot_did_hear_from_quorum(&self, _slot_index: u64, _counter: u32) {}

    /// Consensus: the slot externalized `value`.
    fn value_externalized(&self, _slot_index: u64, _value: &Value) {}
}
