//! Quorum set operations.
//!
//! A quorum slice is satisfied when at least `threshold` of its members
//! (validators or inner sets) are satisfied. A quorum is a node set in
//! which every member's slice is satisfied by the set itself. A v-blocking
//! set intersects every slice of a node's quorum set, so nothing can be
//! ratified past it.
//!
//! All checks run by threshold-counting descent over the quorum set tree,
//! linear in its size; nothing enumerates subsets.

use crate::{Result, ScpError};
use meridian_common::Hash256;
use meridian_wire::{canonical_bytes, NodeId, QuorumSet};
use std::collections::HashSet;

/// Maximum nesting depth for inner sets.
pub const MAXIMUM_QUORUM_NESTING_LEVEL: u32 = 4;

/// Maximum number of distinct nodes in one quorum set.
pub const MAXIMUM_QUORUM_NODES: usize = 1000;

/// Content hash identifying a quorum set in statements.
pub fn quorum_set_hash(quorum_set: &QuorumSet) -> Hash256 {
    Hash256::hash(&canonical_bytes(quorum_set))
}

/// Check if a set of nodes satisfies a quorum slice.
pub fn is_quorum_slice(quorum_set: &QuorumSet, nodes: &HashSet<NodeId>) -> bool {
    let threshold = quorum_set.threshold as usize;
    if threshold == 0 {
        return true;
    }

    let mut count = 0;
    for validator in &quorum_set.validators {
        if nodes.contains(validator) {
            count += 1;
            if count >= threshold {
                return true;
            }
        }
    }
    for inner in &quorum_set.inner_sets {
        if is_quorum_slice(inner, nodes) {
            count += 1;
            if count >= threshold {
                return true;
            }
        }
    }
    false
}

/// Check if a set of nodes forms a quorum with respect to `quorum_set`.
///
/// Every node's own slice must be satisfied by the set; a node whose
/// quorum set is unknown disqualifies the set.
pub fn is_quorum<F>(quorum_set: &QuorumSet, nodes: &HashSet<NodeId>, get_quorum_set: F) -> bool
where
    F: Fn(&NodeId) -> Option<QuorumSet>,
{
    if !is_quorum_slice(quorum_set, nodes) {
        return false;
    }
    for node in nodes {
        match get_quorum_set(node) {
            Some(qs) => {
                if !is_quorum_slice(&qs, nodes) {
                    return false;
                }
            }
            None => return false,
        }
    }
    true
}

/// Check if a set of nodes is v-blocking for `quorum_set`: it intersects
/// every slice, so no quorum can form without it.
pub fn is_v_blocking(quorum_set: &QuorumSet, nodes: &HashSet<NodeId>) -> bool {
    let threshold = quorum_set.threshold as usize;
    if threshold == 0 {
        // an always-satisfied slice cannot be blocked
        return false;
    }

    // blocking needs (members - threshold + 1) failures
    let members = quorum_set.validators.len() + quorum_set.inner_sets.len();
    let blocking_threshold = members.saturating_sub(threshold) + 1;

    let mut count = 0;
    for validator in &quorum_set.validators {
        if nodes.contains(validator) {
            count += 1;
        }
    }
    for inner in &quorum_set.inner_sets {
        if is_v_blocking(inner, nodes) {
            count += 1;
        }
    }
    count >= blocking_threshold
}

/// All node ids referenced anywhere in a quorum set.
pub fn get_all_nodes(quorum_set: &QuorumSet) -> HashSet<NodeId> {
    let mut nodes = HashSet::new();
    collect_nodes(quorum_set, &mut nodes);
    nodes
}

fn collect_nodes(quorum_set: &QuorumSet, nodes: &mut HashSet<NodeId>) {
    for validator in &quorum_set.validators {
        nodes.insert(*validator);
    }
    for inner in &quorum_set.inner_sets {
        collect_nodes(inner, nodes);
    }
}

/// Validate a quorum set's structure: positive threshold within bounds,
/// bounded depth and node count, no duplicate nodes.
pub fn is_quorum_set_sane(quorum_set: &QuorumSet) -> Result<()> {
    let mut known_nodes = HashSet::new();
    check_sanity(quorum_set, 0, &mut known_nodes)?;
    if known_nodes.is_empty() || known_nodes.len() > MAXIMUM_QUORUM_NODES {
        return Err(ScpError::InvalidQuorumSet(format!(
            "node count {} out of range",
            known_nodes.len()
        )));
    }
    Ok(())
}

fn check_sanity(
    quorum_set: &QuorumSet,
    depth: u32,
    known_nodes: &mut HashSet<NodeId>,
) -> Result<()> {
    if depth > MAXIMUM_QUORUM_NESTING_LEVEL {
        return Err(ScpError::InvalidQuorumSet(
            "nesting level exceeded".to_string(),
        ));
    }
    let members = quorum_set.validators.len() + quorum_set.inner_sets.len();
    if quorum_set.threshold < 1 || quorum_set.threshold as usize > members {
        return Err(ScpError::InvalidQuorumSet(format!(
            "threshold {} out of range for {} members",
            quorum_set.threshold, members
        )));
    }
    for validator in &quorum_set.validators {
        if !known_nodes.insert(*validator) {
            return Err(ScpError::InvalidQuorumSet("duplicate node".to_string()));
        }
    }
    for inner in &quorum_set.inner_sets {
        check_sanity(inner, depth + 1, known_nodes)?;
    }
    Ok(())
}
