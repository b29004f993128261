//! Nomination protocol: the first phase of SCP.
//!
//! Nodes vote for candidate values; votes become accepts through federated
//! acceptance, accepts become candidates through ratification, and the
//! candidate set is folded into a single composite value that seeds the
//! ballot protocol.

use crate::driver::{ScpDriver, TimerId, ValidationLevel};
use crate::slot::{federated_accept, federated_ratify};
use crate::{EnvelopeState, LocalNode};
use meridian_wire::{
    NodeId, ScpEnvelope, ScpNomination, ScpStatement, ScpStatementPledges, Value,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Per-slot nomination state.
#[derive(Debug, Default)]
pub struct NominationProtocol {
    round: u32,
    votes: BTreeSet<Value>,
    accepted: BTreeSet<Value>,
    candidates: BTreeSet<Value>,
    latest_composite: Option<Value>,
    /// Latest nomination envelope seen from each node, ourselves included.
    latest_nominations: HashMap<NodeId, ScpEnvelope>,
    /// The value and previous-slot value we are nominating, kept for
    /// timer-driven re-nomination.
    latest_value: Option<Value>,
    previous_value: Value,
    started: bool,
    stopped: bool,
    last_emitted: Option<ScpStatement>,
}

impl NominationProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn votes(&self) -> &BTreeSet<Value> {
        &self.votes
    }

    pub fn accepted(&self) -> &BTreeSet<Value> {
        &self.accepted
    }

    pub fn candidates(&self) -> &BTreeSet<Value> {
        &self.candidates
    }

    pub fn latest_composite(&self) -> Option<&Value> {
        self.latest_composite.as_ref()
    }

    /// Stop nominating (the ballot protocol has taken over).
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// The value to re-nominate when the nomination timer fires.
    pub fn renomination_value(&self) -> Option<(Value, Value)> {
        self.latest_value
            .clone()
            .map(|v| (v, self.previous_value.clone()))
    }

    /// Vote to nominate `value`.
    ///
    /// `timed_out` marks a timer-driven retry and bumps the round. Returns
    /// true when local state changed.
    pub fn nominate<D: ScpDriver>(
        &mut self,
        local: &LocalNode,
        driver: &Arc<D>,
        slot_index: u64,
        value: Value,
        previous_value: &Value,
        timed_out: bool,
    ) -> bool {
        if self.stopped {
            return false;
        }
        if timed_out && !self.started {
            return false;
        }
        if timed_out {
            self.round += 1;
        }
        self.started = true;
        self.latest_value = Some(value.clone());
        self.previous_value = previous_value.clone();

        let mut changed = false;
        if driver.validate_value(slot_index, &value) != ValidationLevel::Invalid
            && self.votes.insert(value.clone())
        {
            driver.nominating_value(slot_index, &value);
            changed = true;
        }

        // when a round times out with nothing confirmed, widen our votes to
        // everything peers have accepted so far
        if timed_out && self.candidates.is_empty() {
            let peer_accepted: Vec<Value> = self
                .latest_nominations
                .values()
                .filter_map(|env| match &env.statement.pledges {
                    ScpStatementPledges::Nominate(nom) => Some(nom.accepted.clone()),
                    _ => None,
                })
                .flatten()
                .collect();
            for accepted in peer_accepted {
                if driver.validate_value(slot_index, &accepted) != ValidationLevel::Invalid
                    && self.votes.insert(accepted)
                {
                    changed = true;
                }
            }
        }

        changed |= self.update_state(local, driver, slot_index);
        if changed {
            self.emit(local, driver, slot_index);
        }

        driver.start_timer(
            slot_index,
            TimerId::Nomination,
            driver.compute_timeout(self.round, TimerId::Nomination),
        );
        changed
    }

    /// Process a peer's nomination envelope.
    pub fn process_envelope<D: ScpDriver>(
        &mut self,
        envelope: &ScpEnvelope,
        local: &LocalNode,
        driver: &Arc<D>,
        slot_index: u64,
    ) -> EnvelopeState {
        let node_id = envelope.statement.node_id;
        let ScpStatementPledges::Nominate(nomination) = &envelope.statement.pledges else {
            return EnvelopeState::Invalid;
        };

        // a newer statement never shrinks either set
        if let Some(existing) = self.latest_nominations.get(&node_id) {
            if let ScpStatementPledges::Nominate(current) = &existing.statement.pledges {
                let grew = nomination.votes.len() > current.votes.len()
                    || nomination.accepted.len() > current.accepted.len();
                if !grew {
                    return EnvelopeState::Valid;
                }
            }
        }
        self.latest_nominations.insert(node_id, envelope.clone());

        if self.stopped {
            return EnvelopeState::Valid;
        }

        let changed = self.update_state(local, driver, slot_index);
        if changed && local.is_validator {
            self.emit(local, driver, slot_index);
        }
        if changed {
            EnvelopeState::ValidNew
        } else {
            EnvelopeState::Valid
        }
    }

    /// Promote votes to accepts and accepts to candidates, and refresh the
    /// composite value. Returns true when anything moved.
    fn update_state<D: ScpDriver>(
        &mut self,
        local: &LocalNode,
        driver: &Arc<D>,
        slot_index: u64,
    ) -> bool {
        let statements = self.statement_map();
        let get_qs = |node_id: &NodeId| {
            if *node_id == local.node_id {
                Some(local.quorum_set.clone())
            } else {
                driver.get_quorum_set(node_id)
            }
        };
        let mut changed = false;

        // everything in play: our votes plus anything any peer accepted
        let mut pool: BTreeSet<Value> = self.votes.clone();
        for statement in statements.values() {
            if let ScpStatementPledges::Nominate(nom) = &statement.pledges {
                pool.extend(nom.accepted.iter().cloned());
            }
        }

        for value in &pool {
            if self.accepted.contains(value) {
                continue;
            }
            let voted = |st: &ScpStatement| match &st.pledges {
                ScpStatementPledges::Nominate(nom) => nom.votes.contains(value),
                _ => false,
            };
            let accepts = |st: &ScpStatement| match &st.pledges {
                ScpStatementPledges::Nominate(nom) => nom.accepted.contains(value),
                _ => false,
            };
            if federated_accept(&voted, &accepts, &statements, local, &get_qs)
                && driver.validate_value(slot_index, value) != ValidationLevel::Invalid
            {
                self.votes.insert(value.clone());
                self.accepted.insert(value.clone());
                changed = true;
            }
        }

        for value in self.accepted.clone() {
            if self.candidates.contains(&value) {
                continue;
            }
            let accepts = |st: &ScpStatement| match &st.pledges {
                ScpStatementPledges::Nominate(nom) => nom.accepted.contains(&value),
                _ => false,
            };
            if federated_ratify(&accepts, &statements, local, &get_qs) {
                self.candidates.insert(value.clone());
                changed = true;
            }
        }

        if changed && !self.candidates.is_empty() {
            let composite = driver.combine_candidates(slot_index, &self.candidates);
            if composite.is_some() && composite != self.latest_composite {
                debug!(slot_index, "nomination produced new composite value");
                self.latest_composite = composite;
            }
        }

        changed
    }

    fn statement_map(&self) -> HashMap<NodeId, ScpStatement> {
        self.latest_nominations
            .iter()
            .map(|(node_id, env)| (*node_id, env.statement.clone()))
            .collect()
    }

    /// Emit our nomination statement if it differs from the last one sent.
    fn emit<D: ScpDriver>(&mut self, local: &LocalNode, driver: &Arc<D>, slot_index: u64) {
        if !local.is_validator {
            return;
        }
        let statement = ScpStatement {
            node_id: local.node_id,
            slot_index,
            pledges: ScpStatementPledges::Nominate(ScpNomination {
                quorum_set_hash: crate::quorum::quorum_set_hash(&local.quorum_set),
                votes: self.votes.iter().cloned().collect(),
                accepted: self.accepted.iter().cloned().collect(),
            }),
        };
        if self.last_emitted.as_ref() == Some(&statement) {
            return;
        }
        let envelope = driver.sign_statement(&statement);
        self.last_emitted = Some(statement);
        self.latest_nominations
            .insert(local.node_id, envelope.clone());
        driver.emit_envelope(&envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_nomination_is_idle() {
        let nomination = NominationProtocol::new();
        assert_eq!(nomination.round(), 0);
        assert!(!nomination.is_started());
        assert!(!nomination.is_stopped());
        assert!(nomination.votes().is_empty());
        assert!(nomination.latest_composite().is_none());
    }
}
