//! Transactional write-set over ledger entries.
//!
//! A [`LedgerDelta`] buffers creates, updates and deletes against a ledger
//! header. Deltas nest: a transaction opens one against the ledger, each
//! operation opens one against the transaction, and commits fold mutations
//! upward. Only the root delta's commit touches the durable store.
//!
//! # Collapse rules
//!
//! Within one delta, mutations of the same key collapse so the emitted
//! change list is minimal:
//!
//! - delete then add  = update
//! - add then delete  = nothing
//! - add then mod     = add (latest value)
//! - mod then mod     = mod (latest value)
//!
//! Anything else touching a live or dead key twice is a programmer error and
//! fails with [`LedgerError::InvalidOp`].

use crate::changes::EntryChange;
use crate::{LedgerError, Result};
use meridian_store::EntryStore;
use meridian_wire::{LedgerEntry, LedgerHeader, LedgerKey};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

/// Lifecycle state of a delta. `Committed` and `RolledBack` are terminal
/// and reject further mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaState {
    Open,
    Committed,
    RolledBack,
}

/// Where a delta's mutations go on commit.
///
/// Implemented by `LedgerDelta` itself so deltas can nest to any depth; the
/// nested delta borrows its outer for its whole lifetime.
trait DeltaSink {
    fn current_header(&self) -> &LedgerHeader;
    fn publish_header(&mut self, header: LedgerHeader);
    fn absorb(
        &mut self,
        dead: &BTreeSet<LedgerKey>,
        new: &BTreeMap<LedgerKey, LedgerEntry>,
        modified: &BTreeMap<LedgerKey, LedgerEntry>,
    ) -> Result<()>;
    fn recache_key(&self, key: &LedgerKey);
}

enum Parent<'a> {
    /// Root delta bound to the canonical header.
    Root { header: &'a mut LedgerHeader },
    /// Nested delta bound to its outer delta.
    Nested { outer: &'a mut dyn DeltaSink },
}

/// A transactional, nestable buffer of entry mutations.
pub struct LedgerDelta<'a> {
    parent: Parent<'a>,
    store: &'a dyn EntryStore,
    /// Working copy of the header; mutations land here until commit.
    header: LedgerHeader,
    /// Parent header value captured at open, for race detection at commit.
    header_snapshot: LedgerHeader,
    new: BTreeMap<LedgerKey, LedgerEntry>,
    modified: BTreeMap<LedgerKey, LedgerEntry>,
    dead: BTreeSet<LedgerKey>,
    state: DeltaState,
}

impl<'a> LedgerDelta<'a> {
    /// Open a root delta bound to the canonical header and the store.
    pub fn open_root(header: &'a mut LedgerHeader, store: &'a dyn EntryStore) -> Self {
        let snapshot = header.clone();
        Self {
            header: snapshot.clone(),
            header_snapshot: snapshot,
            parent: Parent::Root { header },
            store,
            new: BTreeMap::new(),
            modified: BTreeMap::new(),
            dead: BTreeSet::new(),
            state: DeltaState::Open,
        }
    }

    /// Open a delta nested inside `outer`.
    ///
    /// The header view starts from the outer's current header; the same
    /// value is snapshotted for conflict detection at commit.
    pub fn open<'o>(outer: &'a mut LedgerDelta<'o>) -> Result<Self> {
        outer.check_open()?;
        let store = outer.store;
        let snapshot = outer.header.clone();
        Ok(Self {
            header: snapshot.clone(),
            header_snapshot: snapshot,
            parent: Parent::Nested { outer },
            store,
            new: BTreeMap::new(),
            modified: BTreeMap::new(),
            dead: BTreeSet::new(),
            state: DeltaState::Open,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DeltaState {
        self.state
    }

    /// The working header view.
    pub fn header(&self) -> &LedgerHeader {
        &self.header
    }

    /// Mutable working header view. Fails once the delta is terminal.
    pub fn header_mut(&mut self) -> Result<&mut LedgerHeader> {
        self.check_open()?;
        Ok(&mut self.header)
    }

    /// The store this delta tree resolves against.
    pub fn store(&self) -> &'a dyn EntryStore {
        self.store
    }

    fn check_open(&self) -> Result<()> {
        if self.state != DeltaState::Open {
            return Err(LedgerError::InvalidOp(format!(
                "delta is {:?}",
                self.state
            )));
        }
        Ok(())
    }

    /// Promote a freshly created entry into the delta.
    ///
    /// A delete followed by a create collapses to an update.
    pub fn add_entry(&mut self, entry: LedgerEntry) -> Result<()> {
        self.check_open()?;
        let key = entry.key();
        if self.dead.remove(&key) {
            self.modified.insert(key, entry);
        } else {
            if self.new.contains_key(&key) {
                return Err(LedgerError::InvalidOp(format!("double create: {key:?}")));
            }
            if self.modified.contains_key(&key) {
                return Err(LedgerError::InvalidOp(format!(
                    "create of modified key: {key:?}"
                )));
            }
            self.new.insert(key, entry);
        }
        Ok(())
    }

    /// Record the deletion of a key.
    ///
    /// A create followed by a delete cancels out entirely.
    pub fn delete_entry(&mut self, key: &LedgerKey) -> Result<()> {
        self.check_open()?;
        if self.new.remove(key).is_some() {
            return Ok(());
        }
        if self.dead.contains(key) {
            return Err(LedgerError::InvalidOp(format!("double delete: {key:?}")));
        }
        self.modified.remove(key);
        self.dead.insert(key.clone());
        Ok(())
    }

    /// Record a modification, overwriting any buffered value for the key.
    pub fn mod_entry(&mut self, entry: LedgerEntry) -> Result<()> {
        self.check_open()?;
        let key = entry.key();
        if let Some(slot) = self.modified.get_mut(&key) {
            *slot = entry;
        } else if let Some(slot) = self.new.get_mut(&key) {
            *slot = entry;
        } else {
            if self.dead.contains(&key) {
                return Err(LedgerError::InvalidOp(format!(
                    "modify of deleted key: {key:?}"
                )));
            }
            self.modified.insert(key, entry);
        }
        Ok(())
    }

    /// Fold another delta's buffered mutations into this one.
    ///
    /// Order is a contract: Dead first, then New, then Mod, so that the
    /// collapse rules above see deletes before the creates that may cancel
    /// or promote them.
    pub fn merge(&mut self, other: &LedgerDelta<'_>) -> Result<()> {
        self.merge_sets(&other.dead, &other.new, &other.modified)
    }

    fn merge_sets(
        &mut self,
        dead: &BTreeSet<LedgerKey>,
        new: &BTreeMap<LedgerKey, LedgerEntry>,
        modified: &BTreeMap<LedgerKey, LedgerEntry>,
    ) -> Result<()> {
        self.check_open()?;
        for key in dead {
            self.delete_entry(key)?;
        }
        for entry in new.values() {
            self.add_entry(entry.clone())?;
        }
        for entry in modified.values() {
            self.mod_entry(entry.clone())?;
        }
        Ok(())
    }

    /// Commit this delta.
    ///
    /// Fails with [`LedgerError::HeaderRace`] if the parent header no longer
    /// matches the snapshot captured at open. A nested commit folds the
    /// buffered sets into the outer delta and publishes the working header
    /// to it; a root commit materializes live entries and dead keys into the
    /// store and publishes the header into the canonical slot.
    pub fn commit(&mut self) -> Result<()> {
        self.check_open()?;
        let parent_header = match &self.parent {
            Parent::Root { header } => &**header,
            Parent::Nested { outer } => outer.current_header(),
        };
        if *parent_header != self.header_snapshot {
            return Err(LedgerError::HeaderRace);
        }

        match &mut self.parent {
            Parent::Root { header } => {
                for entry in self.new.values().chain(self.modified.values()) {
                    self.store.put(entry)?;
                }
                for key in &self.dead {
                    self.store.delete(key)?;
                }
                **header = self.header.clone();
                debug!(
                    ledger_seq = self.header.ledger_seq,
                    created = self.new.len(),
                    updated = self.modified.len(),
                    removed = self.dead.len(),
                    "root delta committed"
                );
            }
            Parent::Nested { outer } => {
                outer.absorb(&self.dead, &self.new, &self.modified)?;
                outer.publish_header(self.header.clone());
            }
        }
        self.state = DeltaState::Committed;
        Ok(())
    }

    /// Roll this delta back, invalidating cached reads for exactly the keys
    /// it touched so subsequent loads hit the durable store.
    pub fn rollback(&mut self) -> Result<()> {
        self.check_open()?;
        self.flush_touched();
        self.state = DeltaState::RolledBack;
        Ok(())
    }

    fn flush_touched(&self) {
        // Invalidate cached reads for the touched keys, then let ancestor
        // deltas re-publish values they still buffer: the durable store
        // only holds root-committed state, so a bare flush would make the
        // cache forget uncommitted writes that are not being rolled back.
        for key in self
            .new
            .keys()
            .chain(self.modified.keys())
            .chain(self.dead.iter())
        {
            self.store.flush_cached(key);
            if let Parent::Nested { outer } = &self.parent {
                outer.recache_key(key);
            }
        }
        trace!(
            touched = self.new.len() + self.modified.len() + self.dead.len(),
            "delta rolled back"
        );
    }

    /// The ordered change list: Created entries, then Updated entries, then
    /// Removed keys, each bucket sorted by key.
    ///
    /// A rolled-back delta has no changes to report.
    pub fn get_changes(&self) -> Vec<EntryChange> {
        if self.state == DeltaState::RolledBack {
            return Vec::new();
        }
        let mut changes =
            Vec::with_capacity(self.new.len() + self.modified.len() + self.dead.len());
        for entry in self.new.values() {
            changes.push(EntryChange::Created(entry.clone()));
        }
        for entry in self.modified.values() {
            changes.push(EntryChange::Updated(entry.clone()));
        }
        for key in &self.dead {
            changes.push(EntryChange::Removed(key.clone()));
        }
        changes
    }

    /// New and modified entries, by value.
    pub fn get_live_entries(&self) -> Vec<LedgerEntry> {
        self.new
            .values()
            .chain(self.modified.values())
            .cloned()
            .collect()
    }

    /// Deleted keys.
    pub fn get_dead_entries(&self) -> Vec<LedgerKey> {
        self.dead.iter().cloned().collect()
    }

    /// True when the delta buffers no mutations.
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.modified.is_empty() && self.dead.is_empty()
    }

    /// Diagnostic: every live entry must exist in the store with the same
    /// value, and every dead key must be absent.
    ///
    /// Reads go through the store's cache layer, so the check is meaningful
    /// after nested commits as well as after the root commit.
    pub fn check_against_store(&self, store: &dyn EntryStore) -> Result<()> {
        for entry in self.new.values().chain(self.modified.values()) {
            match store.load(&entry.key())? {
                Some(stored) if stored == *entry => {}
                Some(_) => {
                    return Err(LedgerError::Inconsistent(format!(
                        "live entry differs from store: {:?}",
                        entry.key()
                    )))
                }
                None => {
                    return Err(LedgerError::Inconsistent(format!(
                        "live entry missing from store: {:?}",
                        entry.key()
                    )))
                }
            }
        }
        for key in &self.dead {
            if store.exists(key)? {
                return Err(LedgerError::Inconsistent(format!(
                    "dead key still present in store: {key:?}"
                )));
            }
        }
        Ok(())
    }
}

impl DeltaSink for LedgerDelta<'_> {
    fn current_header(&self) -> &LedgerHeader {
        &self.header
    }

    fn publish_header(&mut self, header: LedgerHeader) {
        self.header = header;
    }

    fn absorb(
        &mut self,
        dead: &BTreeSet<LedgerKey>,
        new: &BTreeMap<LedgerKey, LedgerEntry>,
        modified: &BTreeMap<LedgerKey, LedgerEntry>,
    ) -> Result<()> {
        self.merge_sets(dead, new, modified)
    }

    fn recache_key(&self, key: &LedgerKey) {
        if let Some(entry) = self.modified.get(key).or_else(|| self.new.get(key)) {
            self.store.cache_put(entry);
        } else if self.dead.contains(key) {
            self.store.cache_delete(key);
        } else if let Parent::Nested { outer } = &self.parent {
            outer.recache_key(key);
        }
    }
}

impl Drop for LedgerDelta<'_> {
    fn drop(&mut self) {
        // a delta left open at scope exit rolls back implicitly
        if self.state == DeltaState::Open {
            self.flush_touched();
            self.state = DeltaState::RolledBack;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::updated_account_balance;
    use meridian_store::MemoryStore;
    use meridian_wire::{AccountEntry, AccountId};

    fn account_id(seed: u8) -> AccountId {
        AccountId([seed; 32])
    }

    fn account_entry(seed: u8, balance: i64) -> LedgerEntry {
        LedgerEntry::account(AccountEntry::new(account_id(seed), balance))
    }

    fn account_key(seed: u8) -> LedgerKey {
        LedgerKey::Account {
            account_id: account_id(seed),
        }
    }

    #[test]
    fn test_add_then_delete_cancels() {
        let store = MemoryStore::new();
        let mut header = LedgerHeader::default();
        let mut delta = LedgerDelta::open_root(&mut header, &store);

        delta.add_entry(account_entry(1, 100)).unwrap();
        delta.delete_entry(&account_key(1)).unwrap();

        assert!(delta.is_empty());
        assert!(delta.get_changes().is_empty());
        delta.commit().unwrap();
        assert_eq!(store.durable_len(), 0);
    }

    #[test]
    fn test_delete_then_add_promotes_to_update() {
        let store = MemoryStore::new();
        store.seed(account_entry(1, 100));
        let mut header = LedgerHeader::default();
        let mut delta = LedgerDelta::open_root(&mut header, &store);

        delta.delete_entry(&account_key(1)).unwrap();
        delta.add_entry(account_entry(1, 150)).unwrap();
        let changes = delta.get_changes();
        delta.commit().unwrap();

        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_updated());
        assert_eq!(updated_account_balance(&changes[0]), Some(150));
    }

    #[test]
    fn test_mod_collapses_to_latest() {
        let store = MemoryStore::new();
        let mut header = LedgerHeader::default();
        let mut delta = LedgerDelta::open_root(&mut header, &store);

        delta.mod_entry(account_entry(1, 10)).unwrap();
        delta.mod_entry(account_entry(1, 20)).unwrap();

        let changes = delta.get_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(updated_account_balance(&changes[0]), Some(20));
    }

    #[test]
    fn test_add_then_mod_stays_created() {
        let store = MemoryStore::new();
        let mut header = LedgerHeader::default();
        let mut delta = LedgerDelta::open_root(&mut header, &store);

        delta.add_entry(account_entry(1, 10)).unwrap();
        delta.mod_entry(account_entry(1, 25)).unwrap();

        let changes = delta.get_changes();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_created());
        assert_eq!(updated_account_balance(&changes[0]), Some(25));
    }

    #[test]
    fn test_disjointness_violations_rejected() {
        let store = MemoryStore::new();
        let mut header = LedgerHeader::default();
        let mut delta = LedgerDelta::open_root(&mut header, &store);

        delta.add_entry(account_entry(1, 10)).unwrap();
        assert!(matches!(
            delta.add_entry(account_entry(1, 11)),
            Err(LedgerError::InvalidOp(_))
        ));

        delta.delete_entry(&account_key(2)).unwrap();
        assert!(matches!(
            delta.delete_entry(&account_key(2)),
            Err(LedgerError::InvalidOp(_))
        ));
        assert!(matches!(
            delta.mod_entry(account_entry(2, 5)),
            Err(LedgerError::InvalidOp(_))
        ));
    }

    #[test]
    fn test_terminal_delta_rejects_mutation() {
        let store = MemoryStore::new();
        let mut header = LedgerHeader::default();
        let mut delta = LedgerDelta::open_root(&mut header, &store);
        delta.commit().unwrap();

        assert_eq!(delta.state(), DeltaState::Committed);
        assert!(matches!(
            delta.add_entry(account_entry(1, 1)),
            Err(LedgerError::InvalidOp(_))
        ));
        assert!(delta.commit().is_err());
        assert!(delta.header_mut().is_err());
    }

    #[test]
    fn test_nested_commit_folds_into_outer() {
        let store = MemoryStore::new();
        let mut header = LedgerHeader::default();
        let mut outer = LedgerDelta::open_root(&mut header, &store);

        {
            let mut inner = LedgerDelta::open(&mut outer).unwrap();
            inner.add_entry(account_entry(1, 100)).unwrap();
            inner.mod_entry(account_entry(2, 50)).unwrap();
            inner.commit().unwrap();
        }

        let changes = outer.get_changes();
        assert_eq!(changes.len(), 2);
        assert!(changes[0].is_created());
        assert!(changes[1].is_updated());

        outer.commit().unwrap();
        assert_eq!(store.durable_len(), 2);
    }

    #[test]
    fn test_nested_header_mutation_propagates_on_commit() {
        let store = MemoryStore::new();
        let mut header = LedgerHeader::default();
        {
            let mut outer = LedgerDelta::open_root(&mut header, &store);
            {
                let mut inner = LedgerDelta::open(&mut outer).unwrap();
                inner.header_mut().unwrap().fee_pool += 500;
                inner.commit().unwrap();
            }
            assert_eq!(outer.header().fee_pool, 500);
            outer.commit().unwrap();
        }
        assert_eq!(header.fee_pool, 500);
    }

    #[test]
    fn test_header_race_detected() {
        let store = MemoryStore::new();
        let mut header = LedgerHeader::default();
        let mut outer = LedgerDelta::open_root(&mut header, &store);

        let mut inner = LedgerDelta::open(&mut outer).unwrap();
        inner.header_mut().unwrap().fee_pool += 1;
        inner.commit().unwrap();
        drop(inner);

        // a second child opened before the first committed would have seen
        // the outer header move underneath it
        let mut stale = LedgerDelta {
            header: LedgerHeader::default(),
            header_snapshot: LedgerHeader::default(),
            parent: Parent::Nested { outer: &mut outer },
            store: &store,
            new: BTreeMap::new(),
            modified: BTreeMap::new(),
            dead: BTreeSet::new(),
            state: DeltaState::Open,
        };
        assert!(matches!(stale.commit(), Err(LedgerError::HeaderRace)));
    }

    #[test]
    fn test_rollback_flushes_only_touched_keys() {
        let store = MemoryStore::new();
        store.seed(account_entry(1, 100));
        store.seed(account_entry(2, 200));

        // prime the cache with an unrelated key
        store.load(&account_key(2)).unwrap();
        store.cache_put(&account_entry(2, 999));

        let mut header = LedgerHeader::default();
        let mut delta = LedgerDelta::open_root(&mut header, &store);
        store.cache_put(&account_entry(1, 150));
        delta.mod_entry(account_entry(1, 150)).unwrap();
        delta.rollback().unwrap();

        // touched key reads from durable again; untouched cache survives
        use meridian_store::EntryStore as _;
        let one = store.load(&account_key(1)).unwrap().unwrap();
        assert_eq!(updated_account_balance(&EntryChange::Updated(one)), Some(100));
        let two = store.load(&account_key(2)).unwrap().unwrap();
        assert_eq!(updated_account_balance(&EntryChange::Updated(two)), Some(999));
    }

    #[test]
    fn test_nested_rollback_recaches_outer_values() {
        let store = MemoryStore::new();
        store.seed(account_entry(1, 100));
        let mut header = LedgerHeader::default();
        let mut outer = LedgerDelta::open_root(&mut header, &store);
        store.cache_put(&account_entry(1, 70));
        outer.mod_entry(account_entry(1, 70)).unwrap();
        {
            let mut inner = LedgerDelta::open(&mut outer).unwrap();
            store.cache_put(&account_entry(1, 40));
            inner.mod_entry(account_entry(1, 40)).unwrap();
            inner.rollback().unwrap();
        }
        // the outer delta's uncommitted write is visible again
        let entry = store.load(&account_key(1)).unwrap().unwrap();
        assert_eq!(
            updated_account_balance(&EntryChange::Updated(entry)),
            Some(70)
        );
        outer.rollback().unwrap();
        let entry = store.load(&account_key(1)).unwrap().unwrap();
        assert_eq!(
            updated_account_balance(&EntryChange::Updated(entry)),
            Some(100)
        );
    }

    #[test]
    fn test_drop_open_delta_rolls_back() {
        let store = MemoryStore::new();
        store.seed(account_entry(1, 100));
        let mut header = LedgerHeader::default();
        {
            let mut delta = LedgerDelta::open_root(&mut header, &store);
            store.cache_put(&account_entry(1, 500));
            delta.mod_entry(account_entry(1, 500)).unwrap();
            // dropped open
        }
        let entry = store.load(&account_key(1)).unwrap().unwrap();
        assert_eq!(
            updated_account_balance(&EntryChange::Updated(entry)),
            Some(100)
        );
    }

    #[test]
    fn test_merge_order_dead_new_mod() {
        let store = MemoryStore::new();
        let mut header = LedgerHeader::default();
        let mut target = LedgerDelta::open_root(&mut header, &store);
        target.add_entry(account_entry(1, 10)).unwrap();

        // other deleted key 1 and created key 2
        let mut header2 = LedgerHeader::default();
        let mut other = LedgerDelta::open_root(&mut header2, &store);
        other.delete_entry(&account_key(1)).unwrap();
        other.add_entry(account_entry(2, 20)).unwrap();

        target.merge(&other).unwrap();
        other.rollback().unwrap();

        // delete cancelled target's create; only the new key 2 remains
        let changes = target.get_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].key(), account_key(2));
    }

    #[test]
    fn test_check_against_store() {
        let store = MemoryStore::new();
        let mut header = LedgerHeader::default();
        let mut delta = LedgerDelta::open_root(&mut header, &store);
        delta.add_entry(account_entry(1, 100)).unwrap();

        // before materialization the cache has no entry: inconsistent
        assert!(matches!(
            delta.check_against_store(&store),
            Err(LedgerError::Inconsistent(_))
        ));

        store.cache_put(&account_entry(1, 100));
        delta.check_against_store(&store).unwrap();

        delta.commit().unwrap();
        delta.check_against_store(&store).unwrap();
    }

    #[test]
    fn test_changes_sorted_by_key_within_bucket() {
        let store = MemoryStore::new();
        let mut header = LedgerHeader::default();
        let mut delta = LedgerDelta::open_root(&mut header, &store);

        delta.add_entry(account_entry(9, 1)).unwrap();
        delta.add_entry(account_entry(3, 1)).unwrap();
        delta.add_entry(account_entry(6, 1)).unwrap();

        let keys: Vec<_> = delta.get_changes().iter().map(|c| c.key()).collect();
        assert_eq!(keys, vec![account_key(3), account_key(6), account_key(9)]);
    }
}
