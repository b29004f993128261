//! Per-slot consensus driver.
//!
//! A [`Slot`] owns the nomination and ballot protocols for one ledger
//! index, keeps an append-only record of every statement it has seen, and
//! routes incoming envelopes by phase. Once a value externalizes the slot
//! is terminal: it only re-emits and absorbs agreeing envelopes.

use crate::ballot::{BallotPhase, BallotProtocol};
use crate::driver::{ScpDriver, TimerId};
use crate::nomination::NominationProtocol;
use crate::quorum::{is_quorum, is_v_blocking, quorum_set_hash};
use crate::{EnvelopeState, LocalNode};
use meridian_common::Hash256;
use meridian_wire::{NodeId, QuorumSet, ScpEnvelope, ScpStatement, ScpStatementPledges, Value};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Serializable snapshot of a slot's state, for monitoring endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotInfo {
    pub slot_index: u64,
    pub phase: String,
    pub externalized: bool,
    pub statement_count: usize,
    pub nomination_round: u32,
    pub candidate_count: usize,
    pub ballot_counter: u32,
    pub heard_from_quorum: bool,
}

/// The quorum set hash that accompanies a statement.
///
/// For externalize statements this is the commit quorum set's hash, not
/// the hash of a currently-declared set.
pub fn companion_quorum_set_hash(statement: &ScpStatement) -> Hash256 {
    match &statement.pledges {
        ScpStatementPledges::Nominate(nom) => nom.quorum_set_hash,
        ScpStatementPledges::Prepare(prep) => prep.quorum_set_hash,
        ScpStatementPledges::Confirm(conf) => conf.quorum_set_hash,
        ScpStatementPledges::Externalize(ext) => ext.commit_quorum_set_hash,
    }
}

/// Federated accept: either a v-blocking set already accepts, or a quorum
/// including ourselves votes-or-accepts.
pub fn federated_accept<V, A, F>(
    voted: &V,
    accepted: &A,
    statements: &HashMap<NodeId, ScpStatement>,
    local: &LocalNode,
    get_quorum_set: &F,
) -> bool
where
    V: Fn(&ScpStatement) -> bool,
    A: Fn(&ScpStatement) -> bool,
    F: Fn(&NodeId) -> Option<QuorumSet>,
{
    let mut accepting: HashSet<NodeId> = HashSet::new();
    let mut supporting: HashSet<NodeId> = HashSet::new();
    for (node_id, statement) in statements {
        if accepted(statement) {
            accepting.insert(*node_id);
            supporting.insert(*node_id);
        } else if voted(statement) {
            supporting.insert(*node_id);
        }
    }

    if is_v_blocking(&local.quorum_set, &accepting) {
        return true;
    }
    is_quorum(&local.quorum_set, &supporting, get_quorum_set)
}

/// Federated ratify: a quorum in which every member votes.
pub fn federated_ratify<V, F>(
    voted: &V,
    statements: &HashMap<NodeId, ScpStatement>,
    local: &LocalNode,
    get_quorum_set: &F,
) -> bool
where
    V: Fn(&ScpStatement) -> bool,
    F: Fn(&NodeId) -> Option<QuorumSet>,
{
    let mut supporting: HashSet<NodeId> = HashSet::new();
    for (node_id, statement) in statements {
        if voted(statement) {
            supporting.insert(*node_id);
        }
    }
    is_quorum(&local.quorum_set, &supporting, get_quorum_set)
}

/// Consensus state for a single ledger index.
pub struct Slot<D: ScpDriver> {
    slot_index: u64,
    local: LocalNode,
    driver: Arc<D>,
    nomination: NominationProtocol,
    ballot: BallotProtocol,
    /// Every statement this slot has seen, in arrival order. Never pruned.
    statement_history: Vec<ScpStatement>,
    externalized: Option<Value>,
}

impl<D: ScpDriver> Slot<D> {
    pub fn new(slot_index: u64, local: LocalNode, driver: Arc<D>) -> Self {
        Self {
            slot_index,
            local,
            driver,
            nomination: NominationProtocol::new(),
            ballot: BallotProtocol::new(),
            statement_history: Vec::new(),
            externalized: None,
        }
    }

    pub fn slot_index(&self) -> u64 {
        self.slot_index
    }

    pub fn nomination(&self) -> &NominationProtocol {
        &self.nomination
    }

    pub fn ballot(&self) -> &BallotProtocol {
        &self.ballot
    }

    pub fn ballot_phase(&self) -> BallotPhase {
        self.ballot.phase()
    }

    pub fn is_externalized(&self) -> bool {
        self.externalized.is_some()
    }

    pub fn externalized_value(&self) -> Option<&Value> {
        self.externalized.as_ref()
    }

    pub fn statement_count(&self) -> usize {
        self.statement_history.len()
    }

    pub fn statement_history(&self) -> &[ScpStatement] {
        &self.statement_history
    }

    /// Record a statement in the slot's history. Append-only.
    fn record_statement(&mut self, statement: &ScpStatement) {
        self.statement_history.push(statement.clone());
    }

    /// Process an incoming envelope for this slot.
    pub fn process_envelope(&mut self, envelope: &ScpEnvelope) -> EnvelopeState {
        if envelope.statement.slot_index != self.slot_index {
            debug!(
                expected = self.slot_index,
                got = envelope.statement.slot_index,
                "envelope for wrong slot"
            );
            return EnvelopeState::Invalid;
        }
        if !self.driver.verify_envelope(envelope) {
            return EnvelopeState::Invalid;
        }

        self.record_statement(&envelope.statement);

        let result = match &envelope.statement.pledges {
            ScpStatementPledges::Nominate(_) => self.nomination.process_envelope(
                envelope,
                &self.local,
                &self.driver,
                self.slot_index,
            ),
            _ => self.ballot.process_envelope(
                envelope,
                &self.local,
                &self.driver,
                self.slot_index,
            ),
        };

        self.maybe_start_ballot();
        self.maybe_externalize();
        result
    }

    /// Vote to nominate `value`, seeding consensus for this slot.
    pub fn nominate(&mut self, value: Value, previous_value: &Value, timed_out: bool) -> bool {
        if !self.local.is_validator || self.is_externalized() {
            return false;
        }
        let changed = self.nomination.nominate(
            &self.local,
            &self.driver,
            self.slot_index,
            value,
            previous_value,
            timed_out,
        );
        self.maybe_start_ballot();
        changed
    }

    /// Adopt `value` into the ballot protocol (see
    /// [`BallotProtocol::bump_state`]).
    pub fn bump_state(&mut self, value: Value, force: bool) -> bool {
        if !self.local.is_validator {
            return false;
        }
        self.ballot
            .bump_state(&self.local, &self.driver, self.slot_index, value, force)
    }

    /// Give up on the current ballot and move to a higher counter.
    pub fn abandon_ballot(&mut self) -> bool {
        if !self.local.is_validator {
            return false;
        }
        self.ballot
            .abandon_ballot(&self.local, &self.driver, self.slot_index)
    }

    /// Timer callback entry point.
    pub fn on_timer(&mut self, timer: TimerId) {
        match timer {
            TimerId::Nomination => {
                if let Some((value, previous)) = self.nomination.renomination_value() {
                    self.nominate(value, &previous, true);
                }
            }
            TimerId::BallotProtocol => {
                self.ballot
                    .bump_timeout(&self.local, &self.driver, self.slot_index);
            }
        }
        self.maybe_externalize();
    }

    /// Once nomination has a composite value, hand it to the ballot
    /// protocol and stop nominating.
    fn maybe_start_ballot(&mut self) {
        if self.ballot.current_ballot().is_some() || !self.local.is_validator {
            return;
        }
        if let Some(composite) = self.nomination.latest_composite().cloned() {
            info!(slot_index = self.slot_index, "starting ballot protocol");
            self.nomination.stop();
            self.ballot.bump_state(
                &self.local,
                &self.driver,
                self.slot_index,
                composite,
                false,
            );
        }
    }

    fn maybe_externalize(&mut self) {
        if self.externalized.is_none() {
            if let Some(value) = self.ballot.externalized_value() {
                self.externalized = Some(value.clone());
                self.nomination.stop();
            }
        }
    }

    /// Snapshot of the slot for status reporting.
    pub fn info(&self) -> SlotInfo {
        SlotInfo {
            slot_index: self.slot_index,
            phase: format!("{:?}", self.ballot.phase()),
            externalized: self.is_externalized(),
            statement_count: self.statement_history.len(),
            nomination_round: self.nomination.round(),
            candidate_count: self.nomination.candidates().len(),
            ballot_counter: self
                .ballot
                .current_ballot()
                .map(|b| b.counter)
                .unwrap_or(0),
            heard_from_quorum: self.ballot.heard_from_quorum(),
        }
    }

    /// The quorum set governing one of this slot's peers, resolved from
    /// the statement's companion hash through the driver.
    pub fn quorum_set_for_statement(&self, statement: &ScpStatement) -> Option<QuorumSet> {
        if statement.node_id == self.local.node_id {
            return Some(self.local.quorum_set.clone());
        }
        let declared = self.driver.get_quorum_set(&statement.node_id)?;
        // the companion hash pins the exact set the statement was made under
        if quorum_set_hash(&declared) == companion_quorum_set_hash(statement) {
            Some(declared)
        } else {
            None
        }
    }
}

impl<D: ScpDriver> Drop for Slot<D> {
    fn drop(&mut self) {
        self.driver.cancel_timers(self.slot_index);
    }
}
