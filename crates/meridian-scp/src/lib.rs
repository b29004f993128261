//! Stellar Consensus Protocol (SCP) for Meridian.
//!
//! SCP is a federated Byzantine agreement protocol: each node declares whom
//! it trusts through a quorum set, and agreement emerges from overlapping
//! quorum slices rather than a closed membership list.
//!
//! A [`Slot`] drives agreement on one ledger index. Incoming envelopes are
//! dispatched to the [`NominationProtocol`] (proposing and accepting
//! candidate values) or the [`BallotProtocol`] (prepare, confirm,
//! externalize over ballots), and the slot emits updated statements through
//! the [`ScpDriver`] whenever its local state changes.

mod ballot;
mod driver;
mod error;
mod nomination;
mod quorum;
mod slot;

pub use ballot::{get_working_ballot, BallotPhase, BallotProtocol};
pub use driver::{ScpDriver, TimerId, ValidationLevel};
pub use error::ScpError;
pub use nomination::NominationProtocol;
pub use quorum::{
    get_all_nodes, is_quorum, is_quorum_set_sane, is_quorum_slice, is_v_blocking,
    quorum_set_hash, MAXIMUM_QUORUM_NESTING_LEVEL, MAXIMUM_QUORUM_NODES,
};
pub use slot::{companion_quorum_set_hash, federated_accept, federated_ratify, Slot, SlotInfo};

use meridian_wire::{NodeId, QuorumSet};

/// Result type for SCP operations.
pub type Result<T> = std::result::Result<T, ScpError>;

/// The result of processing an SCP envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    /// Bad signature, wrong slot, or malformed statement; dropped.
    Invalid,
    /// Valid but changed nothing (duplicate or older state).
    Valid,
    /// Valid and advanced our state.
    ValidNew,
}

/// The local node's consensus identity.
#[derive(Debug, Clone)]
pub struct LocalNode {
    pub node_id: NodeId,
    pub quorum_set: QuorumSet,
    /// Non-validators track consensus but never vote or emit.
    pub is_validator: bool,
}

impl LocalNode {
    pub fn new(node_id: NodeId, quorum_set: QuorumSet, is_validator: bool) -> Self {
        Self {
            node_id,
            quorum_set,
            is_validator,
        }
    }
}
