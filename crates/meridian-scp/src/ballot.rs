//! Ballot protocol: prepare, confirm, externalize.
//!
//! Ballots are `(counter, value)` pairs ordered lexicographically. The
//! protocol tracks the whitepaper state variables:
//!
//! - `current` (b): the ballot we are working on
//! - `prepared` (p) and `prepared_prime` (p'): the two highest
//!   accepted-prepared ballots, mutually incompatible
//! - `high` (h): the highest confirmed-prepared / accepted-commit bound
//! - `commit` (c): the lowest ballot we are committing
//!
//! Counters only ever grow; once the phase reaches Externalize the value is
//! immutable and only matching envelopes are absorbed.

use crate::driver::{ScpDriver, TimerId};
use crate::quorum::{is_quorum, is_v_blocking, quorum_set_hash};
use crate::slot::{federated_accept, federated_ratify};
use crate::{EnvelopeState, LocalNode};
use meridian_wire::{
    Ballot, NodeId, ScpEnvelope, ScpStatement, ScpStatementConfirm, ScpStatementExternalize,
    ScpStatementPledges, ScpStatementPrepare, Value,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Phase of the ballot protocol. Strictly forward-moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BallotPhase {
    Prepare,
    Confirm,
    Externalize,
}

/// The ballot a node is actively working on, per its latest statement.
pub fn get_working_ballot(statement: &ScpStatement) -> Option<Ballot> {
    match &statement.pledges {
        ScpStatementPledges::Prepare(prep) => Some(prep.ballot.clone()),
        ScpStatementPledges::Confirm(conf) => Some(Ballot::new(
            conf.n_commit,
            conf.ballot.value.clone(),
        )),
        ScpStatementPledges::Externalize(ext) => {
            Some(Ballot::new(u32::MAX, ext.commit.value.clone()))
        }
        ScpStatementPledges::Nominate(_) => None,
    }
}

/// Per-slot ballot protocol state machine.
#[derive(Debug, Default)]
pub struct BallotProtocol {
    phase_confirm: bool,
    phase_externalize: bool,
    current: Option<Ballot>,
    prepared: Option<Ballot>,
    prepared_prime: Option<Ballot>,
    high: Option<Ballot>,
    commit: Option<Ballot>,
    latest_envelopes: HashMap<NodeId, ScpEnvelope>,
    heard_from_quorum: bool,
    last_emitted: Option<ScpStatement>,
}

impl BallotProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> BallotPhase {
        if self.phase_externalize {
            BallotPhase::Externalize
        } else if self.phase_confirm {
            BallotPhase::Confirm
        } else {
            BallotPhase::Prepare
        }
    }

    pub fn current_ballot(&self) -> Option<&Ballot> {
        self.current.as_ref()
    }

    pub fn prepared(&self) -> Option<&Ballot> {
        self.prepared.as_ref()
    }

    pub fn prepared_prime(&self) -> Option<&Ballot> {
        self.prepared_prime.as_ref()
    }

    pub fn high_ballot(&self) -> Option<&Ballot> {
        self.high.as_ref()
    }

    pub fn commit_ballot(&self) -> Option<&Ballot> {
        self.commit.as_ref()
    }

    pub fn heard_from_quorum(&self) -> bool {
        self.heard_from_quorum
    }

    pub fn is_externalized(&self) -> bool {
        self.phase() == BallotPhase::Externalize
    }

    /// The decided value, once externalized.
    pub fn externalized_value(&self) -> Option<&Value> {
        if self.is_externalized() {
            self.commit.as_ref().map(|c| &c.value)
        } else {
            None
        }
    }

    pub fn latest_envelope(&self, node_id: &NodeId) -> Option<&ScpEnvelope> {
        self.latest_envelopes.get(node_id)
    }

    /// Start or re-start work on a ballot carrying `value`.
    ///
    /// In the Prepare phase with no ballot yet (or with `force`), adopts
    /// the value at the next counter; otherwise a no-op.
    pub fn bump_state<D: ScpDriver>(
        &mut self,
        local: &LocalNode,
        driver: &Arc<D>,
        slot_index: u64,
        value: Value,
        force: bool,
    ) -> bool {
        if self.phase() != BallotPhase::Prepare {
            return false;
        }
        if !force && self.current.is_some() {
            return false;
        }
        let counter = self
            .current
            .as_ref()
            .map(|b| b.counter + 1)
            .unwrap_or(1);
        // a confirmed-prepared value wins over the suggestion
        let value = self
            .high
            .as_ref()
            .map(|h| h.value.clone())
            .unwrap_or(value);
        self.bump_to_ballot(Ballot::new(counter, value));
        self.emit(local, driver, slot_index);
        self.check_heard_from_quorum(local, driver, slot_index);
        true
    }

    /// Raise the ballot counter after a timer expiry. Counters never
    /// decrease; the value is kept.
    pub fn bump_timeout<D: ScpDriver>(
        &mut self,
        local: &LocalNode,
        driver: &Arc<D>,
        slot_index: u64,
    ) -> bool {
        if self.phase() == BallotPhase::Externalize {
            return false;
        }
        let Some(ballot) = &self.current else {
            return false;
        };
        let next = Ballot::new(ballot.counter + 1, ballot.value.clone());
        self.bump_to_ballot(next);
        self.advance(None, local, driver, slot_index);
        self.emit(local, driver, slot_index);
        self.check_heard_from_quorum(local, driver, slot_index);
        true
    }

    /// Abandon the current ballot: unconditional counter bump, used by the
    /// outer policy when it wants to move past a stuck ballot.
    pub fn abandon_ballot<D: ScpDriver>(
        &mut self,
        local: &LocalNode,
        driver: &Arc<D>,
        slot_index: u64,
    ) -> bool {
        self.bump_timeout(local, driver, slot_index)
    }

    /// Process a ballot-phase envelope.
    pub fn process_envelope<D: ScpDriver>(
        &mut self,
        envelope: &ScpEnvelope,
        local: &LocalNode,
        driver: &Arc<D>,
        slot_index: u64,
    ) -> EnvelopeState {
        let statement = &envelope.statement;
        if matches!(statement.pledges, ScpStatementPledges::Nominate(_)) {
            return EnvelopeState::Invalid;
        }

        if let Some(existing) = self.latest_envelopes.get(&statement.node_id) {
            if !is_newer_statement(&existing.statement, statement) {
                return EnvelopeState::Invalid;
            }
        }

        if self.phase() == BallotPhase::Externalize {
            // the slot is decided; only record agreement on the same value
            let decided = self.commit.as_ref().map(|c| &c.value);
            let matches = get_working_ballot(statement)
                .map(|wb| Some(&wb.value) == decided)
                .unwrap_or(false);
            if matches {
                self.latest_envelopes
                    .insert(statement.node_id, envelope.clone());
                return EnvelopeState::Valid;
            }
            return EnvelopeState::Invalid;
        }

        self.latest_envelopes
            .insert(statement.node_id, envelope.clone());
        let changed = self.advance(Some(statement.clone()), local, driver, slot_index);
        if changed {
            self.emit(local, driver, slot_index);
        }
        self.check_heard_from_quorum(local, driver, slot_index);
        if changed {
            EnvelopeState::ValidNew
        } else {
            EnvelopeState::Valid
        }
    }

    /// Run the transition attempts to a fixpoint. Returns true if any state
    /// variable moved.
    fn advance<D: ScpDriver>(
        &mut self,
        hint: Option<ScpStatement>,
        local: &LocalNode,
        driver: &Arc<D>,
        slot_index: u64,
    ) -> bool {
        let mut state_changed = false;
        loop {
            let mut round_changed = false;
            round_changed |= self.attempt_accept_prepared(&hint, local, driver, slot_index);
            round_changed |= self.attempt_confirm_prepared(local, driver, slot_index);
            round_changed |= self.attempt_accept_commit(&hint, local, driver, slot_index);
            round_changed |= self.attempt_confirm_commit(local, driver, slot_index);
            if !round_changed {
                break;
            }
            state_changed = true;
        }
        state_changed |= self.attempt_bump_from_vblocking(local);
        state_changed
    }

    fn statement_map(&self) -> HashMap<NodeId, ScpStatement> {
        self.latest_envelopes
            .iter()
            .map(|(node_id, env)| (*node_id, env.statement.clone()))
            .collect()
    }

    fn bump_to_ballot(&mut self, ballot: Ballot) {
        debug_assert!(
            self.current
                .as_ref()
                .map_or(true, |b| b.counter <= ballot.counter),
            "ballot counters are monotone"
        );
        self.current = Some(ballot);
        self.heard_from_quorum = false;
    }

    /// Ballots that some statement claims prepared or is preparing,
    /// newest first.
    fn prepare_candidates(&self, hint: &Option<ScpStatement>) -> Vec<Ballot> {
        let mut set: BTreeSet<Ballot> = BTreeSet::new();
        let statements = self.statement_map();
        let hint_iter = hint.iter();
        for statement in statements.values().chain(hint_iter) {
            match &statement.pledges {
                ScpStatementPledges::Prepare(prep) => {
                    set.insert(prep.ballot.clone());
                    if let Some(p) = &prep.prepared {
                        set.insert(p.clone());
                    }
                    if let Some(pp) = &prep.prepared_prime {
                        set.insert(pp.clone());
                    }
                }
                ScpStatementPledges::Confirm(conf) => {
                    set.insert(Ballot::new(conf.n_prepared, conf.ballot.value.clone()));
                    set.insert(conf.ballot.clone());
                }
                ScpStatementPledges::Externalize(ext) => {
                    set.insert(ext.commit.clone());
                }
                ScpStatementPledges::Nominate(_) => {}
            }
        }
        set.into_iter().rev().collect()
    }

    fn attempt_accept_prepared<D: ScpDriver>(
        &mut self,
        hint: &Option<ScpStatement>,
        local: &LocalNode,
        driver: &Arc<D>,
        slot_index: u64,
    ) -> bool {
        if self.phase() == BallotPhase::Externalize {
            return false;
        }
        let statements = self.statement_map();
        let get_qs = qs_resolver(local, driver);

        for candidate in self.prepare_candidates(hint) {
            // in Confirm we only care about ballots compatible with the
            // committing value
            if self.phase() == BallotPhase::Confirm {
                let compatible = self
                    .commit
                    .as_ref()
                    .map_or(false, |c| candidate.compatible(c));
                if !compatible {
                    continue;
                }
            }
            if self
                .prepared
                .as_ref()
                .map_or(false, |p| candidate.less_and_compatible(p))
            {
                continue;
            }

            let voted = |st: &ScpStatement| statement_votes_prepare(&candidate, st);
            let accepts = |st: &ScpStatement| statement_accepts_prepared(&candidate, st);
            if federated_accept(&voted, &accepts, &statements, local, &get_qs)
                && self.set_prepared(candidate.clone())
            {
                driver.accepted_ballot_prepared(slot_index, candidate.counter, &candidate.value);
                return true;
            }
        }
        false
    }

    fn set_prepared(&mut self, ballot: Ballot) -> bool {
        let mut did = false;
        match &self.prepared {
            None => {
                self.prepared = Some(ballot.clone());
                did = true;
            }
            Some(p) => {
                if *p < ballot {
                    if !p.compatible(&ballot) {
                        self.prepared_prime = Some(p.clone());
                    }
                    self.prepared = Some(ballot.clone());
                    did = true;
                } else if *p > ballot && !p.compatible(&ballot) {
                    let improves = self
                        .prepared_prime
                        .as_ref()
                        .map_or(true, |pp| *pp < ballot);
                    if improves {
                        self.prepared_prime = Some(ballot.clone());
                        did = true;
                    }
                }
            }
        }

        // an incompatible prepared ballot past h aborts the pending commit
        if let Some(high) = &self.high {
            let aborted = self
                .prepared
                .as_ref()
                .map_or(false, |p| high.less_and_incompatible(p))
                || self
                    .prepared_prime
                    .as_ref()
                    .map_or(false, |pp| high.less_and_incompatible(pp));
            if aborted && !self.phase_confirm {
                self.commit = None;
            }
        }

        did
    }

    fn attempt_confirm_prepared<D: ScpDriver>(
        &mut self,
        local: &LocalNode,
        driver: &Arc<D>,
        slot_index: u64,
    ) -> bool {
        if self.phase() != BallotPhase::Prepare {
            return false;
        }
        let Some(prepared) = self.prepared.clone() else {
            return false;
        };
        if self.high.as_ref().map_or(false, |h| *h >= prepared) {
            return false;
        }

        let statements = self.statement_map();
        let get_qs = qs_resolver(local, driver);
        let accepts = |st: &ScpStatement| statement_accepts_prepared(&prepared, st);
        if !federated_ratify(&accepts, &statements, local, &get_qs) {
            return false;
        }

        debug!(slot_index, counter = prepared.counter, "confirmed prepared");
        self.high = Some(prepared.clone());
        if self
            .current
            .as_ref()
            .map_or(true, |b| *b < prepared)
        {
            self.bump_to_ballot(prepared.clone());
        }
        if self.commit.is_none() {
            if let Some(b) = &self.current {
                if b.less_and_compatible(&prepared) {
                    // vote to commit everything from b up to h
                    self.commit = Some(b.clone());
                }
            }
        }
        true
    }

    /// Counters named by statements that vote or accept commit for
    /// `ballot`'s value, candidates for the commit interval bounds.
    fn commit_boundaries(&self, ballot: &Ballot) -> Vec<u32> {
        let mut bounds = BTreeSet::new();
        for envelope in self.latest_envelopes.values() {
            match &envelope.statement.pledges {
                ScpStatementPledges::Prepare(prep) => {
                    if ballot.compatible(&prep.ballot) && prep.n_c != 0 {
                        bounds.insert(prep.n_c);
                        bounds.insert(prep.n_h);
                    }
                }
                ScpStatementPledges::Confirm(conf) => {
                    if ballot.compatible(&conf.ballot) {
                        bounds.insert(conf.n_commit);
                        bounds.insert(conf.n_h);
                    }
                }
                ScpStatementPledges::Externalize(ext) => {
                    if ballot.compatible(&ext.commit) {
                        bounds.insert(ext.commit.counter);
                        bounds.insert(ext.n_h);
                        bounds.insert(u32::MAX);
                    }
                }
                ScpStatementPledges::Nominate(_) => {}
            }
        }
        bounds.into_iter().collect()
    }

    /// Grow a commit interval downward from the highest boundary while the
    /// predicate keeps holding, returning the widest passing interval.
    fn find_extended_interval<F>(&self, boundaries: &[u32], pred: F) -> Option<(u32, u32)>
    where
        F: Fn((u32, u32)) -> bool,
    {
        let mut found: Option<(u32, u32)> = None;
        for boundary in boundaries.iter().rev() {
            let candidate = match found {
                None => (*boundary, *boundary),
                Some((_, high)) => (*boundary, high),
            };
            if pred(candidate) {
                found = Some(candidate);
            } else if found.is_some() {
                break;
            }
        }
        found
    }

    fn attempt_accept_commit<D: ScpDriver>(
        &mut self,
        hint: &Option<ScpStatement>,
        local: &LocalNode,
        driver: &Arc<D>,
        slot_index: u64,
    ) -> bool {
        if self.phase() == BallotPhase::Externalize {
            return false;
        }
        let Some(hint) = hint else {
            return false;
        };

        // the hint tells us which value and high counter to try
        let ballot = match &hint.pledges {
            ScpStatementPledges::Prepare(prep) => {
                if prep.n_c == 0 {
                    return false;
                }
                Ballot::new(prep.n_h, prep.ballot.value.clone())
            }
            ScpStatementPledges::Confirm(conf) => {
                Ballot::new(conf.n_h, conf.ballot.value.clone())
            }
            ScpStatementPledges::Externalize(ext) => {
                Ballot::new(ext.n_h, ext.commit.value.clone())
            }
            ScpStatementPledges::Nominate(_) => return false,
        };

        if self.phase() == BallotPhase::Confirm {
            let compatible = self
                .high
                .as_ref()
                .map_or(false, |h| h.compatible(&ballot));
            if !compatible {
                return false;
            }
        }

        let statements = self.statement_map();
        let get_qs = qs_resolver(local, driver);
        let boundaries = self.commit_boundaries(&ballot);
        if boundaries.is_empty() {
            return false;
        }

        let pred = |interval: (u32, u32)| {
            let voted =
                |st: &ScpStatement| statement_votes_commit(&ballot, interval, st);
            let accepts =
                |st: &ScpStatement| statement_accepts_commit(&ballot, interval, st);
            federated_accept(&voted, &accepts, &statements, local, &get_qs)
        };
        let Some((low, high)) = self.find_extended_interval(&boundaries, pred) else {
            return false;
        };

        // only meaningful when it moves us forward
        let advances = !self.phase_confirm
            || self.high.as_ref().map_or(true, |h| high > h.counter)
            || self.commit.as_ref().map_or(true, |c| low < c.counter);
        if !advances {
            return false;
        }

        info!(slot_index, low, high, "accepted commit");
        self.commit = Some(Ballot::new(low, ballot.value.clone()));
        self.high = Some(Ballot::new(high, ballot.value.clone()));
        if !self.phase_confirm {
            self.phase_confirm = true;
            if self
                .current
                .as_ref()
                .map_or(true, |b| b.counter < high)
            {
                self.bump_to_ballot(Ballot::new(high, ballot.value.clone()));
            }
        }
        driver.accepted_commit(slot_index, low, &ballot.value);
        true
    }

    fn attempt_confirm_commit<D: ScpDriver>(
        &mut self,
        local: &LocalNode,
        driver: &Arc<D>,
        slot_index: u64,
    ) -> bool {
        if self.phase() != BallotPhase::Confirm {
            return false;
        }
        let (Some(commit), Some(_high)) = (self.commit.clone(), self.high.clone()) else {
            return false;
        };

        let statements = self.statement_map();
        let get_qs = qs_resolver(local, driver);
        let boundaries = self.commit_boundaries(&commit);
        if boundaries.is_empty() {
            return false;
        }
        let pred = |interval: (u32, u32)| {
            let accepts =
                |st: &ScpStatement| statement_accepts_commit(&commit, interval, st);
            federated_ratify(&accepts, &statements, local, &get_qs)
        };
        let Some((low, high)) = self.find_extended_interval(&boundaries, pred) else {
            return false;
        };

        self.commit = Some(Ballot::new(low, commit.value.clone()));
        self.high = Some(Ballot::new(high, commit.value.clone()));
        self.phase_externalize = true;
        info!(slot_index, low, high, "externalized");
        driver.cancel_timers(slot_index);
        driver.value_externalized(slot_index, &commit.value);
        true
    }

    /// When a v-blocking set is working on higher counters, jump to the
    /// lowest of them; we cannot make progress below.
    fn attempt_bump_from_vblocking(&mut self, local: &LocalNode) -> bool {
        if self.phase() == BallotPhase::Externalize {
            return false;
        }
        let Some(current) = self.current.clone() else {
            return false;
        };

        loop {
            let mut ahead: HashSet<NodeId> = HashSet::new();
            let mut lowest: Option<u32> = None;
            let counter = self.current.as_ref().map(|b| b.counter).unwrap_or(0);
            for (node_id, envelope) in &self.latest_envelopes {
                if let Some(wb) = get_working_ballot(&envelope.statement) {
                    if wb.counter > counter {
                        ahead.insert(*node_id);
                        lowest = Some(lowest.map_or(wb.counter, |l| l.min(wb.counter)));
                    }
                }
            }
            let Some(target) = lowest else { break };
            if !is_v_blocking(&local.quorum_set, &ahead) {
                break;
            }
            self.bump_to_ballot(Ballot::new(target, current.value.clone()));
        }

        self.current.as_ref().map(|b| b.counter).unwrap_or(0) != current.counter
    }

    fn check_heard_from_quorum<D: ScpDriver>(
        &mut self,
        local: &LocalNode,
        driver: &Arc<D>,
        slot_index: u64,
    ) {
        let Some(ballot) = &self.current else {
            return;
        };
        let mut nodes: HashSet<NodeId> = HashSet::new();
        nodes.insert(local.node_id);
        for (node_id, envelope) in &self.latest_envelopes {
            if let Some(wb) = get_working_ballot(&envelope.statement) {
                if wb.counter >= ballot.counter {
                    nodes.insert(*node_id);
                }
            }
        }
        let get_qs = qs_resolver(local, driver);
        if is_quorum(&local.quorum_set, &nodes, get_qs) {
            if !self.heard_from_quorum {
                self.heard_from_quorum = true;
                driver.ballot_did_hear_from_quorum(slot_index, ballot.counter);
                if !self.is_externalized() {
                    driver.start_timer(
                        slot_index,
                        TimerId::BallotProtocol,
                        driver.compute_timeout(ballot.counter, TimerId::BallotProtocol),
                    );
                }
            }
        } else {
            self.heard_from_quorum = false;
        }
    }

    fn build_statement(&self, local: &LocalNode, slot_index: u64) -> Option<ScpStatement> {
        let qs_hash = quorum_set_hash(&local.quorum_set);
        let pledges = match self.phase() {
            BallotPhase::Prepare => {
                let ballot = self.current.clone()?;
                ScpStatementPledges::Prepare(ScpStatementPrepare {
                    quorum_set_hash: qs_hash,
                    ballot,
                    prepared: self.prepared.clone(),
                    prepared_prime: self.prepared_prime.clone(),
                    n_c: self.commit.as_ref().map(|c| c.counter).unwrap_or(0),
                    n_h: self.high.as_ref().map(|h| h.counter).unwrap_or(0),
                })
            }
            BallotPhase::Confirm => {
                let ballot = self.current.clone()?;
                ScpStatementPledges::Confirm(ScpStatementConfirm {
                    ballot,
                    n_prepared: self.prepared.as_ref().map(|p| p.counter).unwrap_or(0),
                    n_commit: self.commit.as_ref().map(|c| c.counter).unwrap_or(0),
                    n_h: self.high.as_ref().map(|h| h.counter).unwrap_or(0),
                    quorum_set_hash: qs_hash,
                })
            }
            BallotPhase::Externalize => {
                let commit = self.commit.clone()?;
                ScpStatementPledges::Externalize(ScpStatementExternalize {
                    commit,
                    n_h: self.high.as_ref().map(|h| h.counter).unwrap_or(0),
                    // for externalize the companion hash names the quorum
                    // set that ratified the commit
                    commit_quorum_set_hash: qs_hash,
                })
            }
        };
        Some(ScpStatement {
            node_id: local.node_id,
            slot_index,
            pledges,
        })
    }

    /// Emit our current statement if it changed since the last emission.
    fn emit<D: ScpDriver>(&mut self, local: &LocalNode, driver: &Arc<D>, slot_index: u64) {
        if !local.is_validator {
            return;
        }
        let Some(statement) = self.build_statement(local, slot_index) else {
            return;
        };
        if self.last_emitted.as_ref() == Some(&statement) {
            return;
        }
        let envelope = driver.sign_statement(&statement);
        self.last_emitted = Some(statement);
        self.latest_envelopes
            .insert(local.node_id, envelope.clone());
        driver.emit_envelope(&envelope);
    }
}

/// Strictly-newer ordering on ballot statements from one node.
fn is_newer_statement(old: &ScpStatement, new: &ScpStatement) -> bool {
    fn rank(pledges: &ScpStatementPledges) -> u8 {
        match pledges {
            ScpStatementPledges::Nominate(_) => 0,
            ScpStatementPledges::Prepare(_) => 1,
            ScpStatementPledges::Confirm(_) => 2,
            ScpStatementPledges::Externalize(_) => 3,
        }
    }
    let (old_rank, new_rank) = (rank(&old.pledges), rank(&new.pledges));
    if new_rank != old_rank {
        return new_rank > old_rank;
    }
    match (&old.pledges, &new.pledges) {
        (ScpStatementPledges::Prepare(o), ScpStatementPledges::Prepare(n)) => {
            let old_key = (&o.ballot, &o.prepared, &o.prepared_prime, o.n_h);
            let new_key = (&n.ballot, &n.prepared, &n.prepared_prime, n.n_h);
            new_key > old_key
        }
        (ScpStatementPledges::Confirm(o), ScpStatementPledges::Confirm(n)) => {
            let old_key = (&o.ballot, o.n_prepared, o.n_commit, o.n_h);
            let new_key = (&n.ballot, n.n_prepared, n.n_commit, n.n_h);
            new_key > old_key
        }
        // externalize statements are final
        _ => false,
    }
}

/// Does `statement` vote to prepare `ballot`?
fn statement_votes_prepare(ballot: &Ballot, statement: &ScpStatement) -> bool {
    match &statement.pledges {
        ScpStatementPledges::Prepare(prep) => ballot.less_and_compatible(&prep.ballot),
        ScpStatementPledges::Confirm(conf) => ballot.compatible(&conf.ballot),
        ScpStatementPledges::Externalize(ext) => ballot.compatible(&ext.commit),
        ScpStatementPledges::Nominate(_) => false,
    }
}

/// Does `statement` claim `ballot` accepted as prepared?
fn statement_accepts_prepared(ballot: &Ballot, statement: &ScpStatement) -> bool {
    match &statement.pledges {
        ScpStatementPledges::Prepare(prep) => {
            prep.prepared
                .as_ref()
                .map_or(false, |p| ballot.less_and_compatible(p))
                || prep
                    .prepared_prime
                    .as_ref()
                    .map_or(false, |pp| ballot.less_and_compatible(pp))
        }
        ScpStatementPledges::Confirm(conf) => {
            let prepared = Ballot::new(conf.n_prepared, conf.ballot.value.clone());
            ballot.less_and_compatible(&prepared)
        }
        ScpStatementPledges::Externalize(ext) => ballot.compatible(&ext.commit),
        ScpStatementPledges::Nominate(_) => false,
    }
}

/// Does `statement` vote to commit `ballot`'s value over `interval`?
fn statement_votes_commit(
    ballot: &Ballot,
    interval: (u32, u32),
    statement: &ScpStatement,
) -> bool {
    match &statement.pledges {
        ScpStatementPledges::Prepare(prep) => {
            ballot.compatible(&prep.ballot)
                && prep.n_c != 0
                && prep.n_c <= interval.0
                && interval.1 <= prep.n_h
        }
        ScpStatementPledges::Confirm(conf) => {
            ballot.compatible(&conf.ballot) && conf.n_commit <= interval.0
        }
        ScpStatementPledges::Externalize(ext) => {
            ballot.compatible(&ext.commit) && ext.commit.counter <= interval.0
        }
        ScpStatementPledges::Nominate(_) => false,
    }
}

/// Does `statement` claim the commit accepted over `interval`?
fn statement_accepts_commit(
    ballot: &Ballot,
    interval: (u32, u32),
    statement: &ScpStatement,
) -> bool {
    match &statement.pledges {
        ScpStatementPledges::Confirm(conf) => {
            ballot.compatible(&conf.ballot)
                && conf.n_commit <= interval.0
                && interval.1 <= conf.n_h
        }
        ScpStatementPledges::Externalize(ext) => {
            ballot.compatible(&ext.commit) && ext.commit.counter <= interval.0
        }
        _ => false,
    }
}

fn qs_resolver<'a, D: ScpDriver>(
    local: &'a LocalNode,
    driver: &'a Arc<D>,
) -> impl Fn(&NodeId) -> Option<meridian_wire::QuorumSet> + 'a {
    move |node_id: &NodeId| {
        if *node_id == local.node_id {
            Some(local.quorum_set.clone())
        } else {
            driver.get_quorum_set(node_id)
        }
    }
}
