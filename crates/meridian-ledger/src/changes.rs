//! Change log emitted by committed deltas.

use meridian_common::Metrics;
use meridian_wire::{LedgerEntry, LedgerEntryData, LedgerKey};

/// A single change to a ledger entry.
///
/// The change list of a delta is minimal: within one delta, repeated
/// mutations of the same key collapse to at most one change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryChange {
    /// A new entry that did not exist before.
    Created(LedgerEntry),
    /// An existing entry with its new value.
    Updated(LedgerEntry),
    /// An entry that was removed.
    Removed(LedgerKey),
}

impl EntryChange {
    /// The key this change applies to.
    pub fn key(&self) -> LedgerKey {
        match self {
            EntryChange::Created(entry) => entry.key(),
            EntryChange::Updated(entry) => entry.key(),
            EntryChange::Removed(key) => key.clone(),
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, EntryChange::Created(_))
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, EntryChange::Updated(_))
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, EntryChange::Removed(_))
    }
}

fn entry_kind(key: &LedgerKey) -> &'static str {
    match key {
        LedgerKey::Account { .. } => "account",
        LedgerKey::Trustline { .. } => "trust",
        LedgerKey::Offer { .. } => "offer",
    }
}

/// Mark per-kind counters for a change list.
pub fn mark_meters(changes: &[EntryChange], metrics: &dyn Metrics) {
    for change in changes {
        let action = match change {
            EntryChange::Created(_) => "add",
            EntryChange::Updated(_) => "modify",
            EntryChange::Removed(_) => "delete",
        };
        metrics.mark(&["ledger", entry_kind(&change.key()), action]);
    }
}

/// Convenience projection used by tests and history emission.
pub fn updated_account_balance(change: &EntryChange) -> Option<i64> {
    match change {
        EntryChange::Created(entry) | EntryChange::Updated(entry) => match &entry.data {
            LedgerEntryData::Account(account) => Some(account.balance),
            _ => None,
        },
        EntryChange::Removed(_) => None,
    }
}
