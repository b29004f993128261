//! Consensus statement types.

use meridian_common::Hash256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validator identifier: ed25519 public key bytes.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct NodeId(pub [u8; 32]);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NodeId({:02x}{:02x}{:02x}{:02x})",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// An opaque consensus value (for this ledger, the hashed transaction set
/// plus close time, but the protocol never looks inside).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Value(pub Vec<u8>);

impl Value {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: Vec<u8> = self.0.iter().copied().take(4).collect();
        write!(f, "Value({})", hex::encode(prefix))
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value(bytes)
    }
}

/// A ballot: `(counter, value)`, ordered lexicographically.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Ballot {
    pub counter: u32,
    pub value: Value,
}

impl Ballot {
    pub fn new(counter: u32, value: Value) -> Self {
        Self { counter, value }
    }

    /// Two ballots are compatible when they carry the same value.
    pub fn compatible(&self, other: &Ballot) -> bool {
        self.value == other.value
    }

    /// `self <= other` and compatible.
    pub fn less_and_compatible(&self, other: &Ballot) -> bool {
        self <= other && self.compatible(other)
    }

    /// `self <= other` and incompatible.
    pub fn less_and_incompatible(&self, other: &Ballot) -> bool {
        self <= other && !self.compatible(other)
    }
}

/// A quorum set: a threshold over validators and nested sets.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct QuorumSet {
    pub threshold: u32,
    pub validators: Vec<NodeId>,
    pub inner_sets: Vec<QuorumSet>,
}

impl QuorumSet {
    /// A flat threshold-of-validators set.
    pub fn simple(threshold: u32, validators: Vec<NodeId>) -> Self {
        Self {
            threshold,
            validators,
            inner_sets: Vec::new(),
        }
    }

    /// A 1-of-1 set containing only the given node.
    pub fn singleton(node_id: NodeId) -> Self {
        Self::simple(1, vec![node_id])
    }
}

/// Nomination pledges: values voted for and values accepted.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ScpNomination {
    pub quorum_set_hash: Hash256,
    pub votes: Vec<Value>,
    pub accepted: Vec<Value>,
}

/// Prepare-phase pledges.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ScpStatementPrepare {
    pub quorum_set_hash: Hash256,
    /// The ballot being voted prepared.
    pub ballot: Ballot,
    /// Highest accepted-prepared ballot, if any.
    pub prepared: Option<Ballot>,
    /// Second highest accepted-prepared, incompatible with `prepared`.
    pub prepared_prime: Option<Ballot>,
    /// Lowest counter voted committed (zero when none).
    pub n_c: u32,
    /// Highest counter confirmed prepared (zero when none).
    pub n_h: u32,
}

/// Confirm-phase pledges.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ScpStatementConfirm {
    pub ballot: Ballot,
    pub n_prepared: u32,
    pub n_commit: u32,
    pub n_h: u32,
    pub quorum_set_hash: Hash256,
}

/// Externalize pledges: the decided commit.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ScpStatementExternalize {
    pub commit: Ballot,
    pub n_h: u32,
    /// Hash of the quorum set that ratified the commit.
    pub commit_quorum_set_hash: Hash256,
}

/// The phase-tagged payload of a statement.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ScpStatementPledges {
    Nominate(ScpNomination),
    Prepare(ScpStatementPrepare),
    Confirm(ScpStatementConfirm),
    Externalize(ScpStatementExternalize),
}

/// A statement a node makes about one slot.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ScpStatement {
    pub node_id: NodeId,
    pub slot_index: u64,
    pub pledges: ScpStatementPledges,
}

/// A signed statement.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ScpEnvelope {
    pub statement: ScpStatement,
    pub signature: Vec<u8>,
}
