//! In-memory entry store.

use crate::{EntryStore, Result, StoreError};
use meridian_wire::{
    AccountId, LedgerEntry, LedgerEntryData, LedgerKey, OfferEntry, TrustLineEntry,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// Entry store backed by in-process maps.
///
/// The durable layer is a `BTreeMap` (sorted iteration keeps the
/// account-scoped queries deterministic); the cache layer stores
/// `Option<LedgerEntry>` so that uncommitted deletes are visible as
/// tombstones.
#[derive(Default)]
pub struct MemoryStore {
    durable: RwLock<BTreeMap<LedgerKey, LedgerEntry>>,
    cache: RwLock<HashMap<LedgerKey, Option<LedgerEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the durable layer directly, bypassing the delta protocol.
    /// Intended for constructing test and genesis states.
    pub fn seed(&self, entry: LedgerEntry) {
        self.durable.write().insert(entry.key(), entry);
    }

    /// Number of durable entries.
    pub fn durable_len(&self) -> usize {
        self.durable.read().len()
    }

    /// Resolve a key through cache then durable, without populating the cache.
    fn resolve(&self, key: &LedgerKey) -> Option<LedgerEntry> {
        if let Some(slot) = self.cache.read().get(key) {
            return slot.clone();
        }
        self.durable.read().get(key).cloned()
    }

    /// Visit every live entry for an account, cache overlay applied.
    fn for_each_of_account<F>(&self, account: &AccountId, mut visit: F)
    where
        F: FnMut(&LedgerEntry),
    {
        let durable = self.durable.read();
        let cache = self.cache.read();

        for (key, entry) in durable.iter() {
            if key_account(key) != Some(account) {
                continue;
            }
            match cache.get(key) {
                Some(Some(cached)) => visit(cached),
                Some(None) => {} // tombstoned
                None => visit(entry),
            }
        }
        // cache-only entries (created but not yet durable)
        for (key, slot) in cache.iter() {
            if key_account(key) != Some(account) {
                continue;
            }
            if durable.contains_key(key) {
                continue;
            }
            if let Some(entry) = slot {
                visit(entry);
            }
        }
    }
}

fn key_account(key: &LedgerKey) -> Option<&AccountId> {
    match key {
        LedgerKey::Account { account_id } => Some(account_id),
        LedgerKey::Trustline { account_id, .. } => Some(account_id),
        LedgerKey::Offer { account_id, .. } => Some(account_id),
    }
}

impl EntryStore for MemoryStore {
    fn load(&self, key: &LedgerKey) -> Result<Option<LedgerEntry>> {
        if let Some(slot) = self.cache.read().get(key) {
            return Ok(slot.clone());
        }
        let loaded = self.durable.read().get(key).cloned();
        if let Some(entry) = &loaded {
            self.cache.write().insert(key.clone(), Some(entry.clone()));
        }
        Ok(loaded)
    }

    fn exists(&self, key: &LedgerKey) -> Result<bool> {
        Ok(self.resolve(key).is_some())
    }

    fn put(&self, entry: &LedgerEntry) -> Result<()> {
        let key = entry.key();
        trace!(?key, "store put");
        self.durable.write().insert(key.clone(), entry.clone());
        self.cache.write().insert(key, Some(entry.clone()));
        Ok(())
    }

    fn delete(&self, key: &LedgerKey) -> Result<()> {
        trace!(?key, "store delete");
        self.durable.write().remove(key);
        self.cache.write().remove(key);
        Ok(())
    }

    fn cache_put(&self, entry: &LedgerEntry) {
        self.cache
            .write()
            .insert(entry.key(), Some(entry.clone()));
    }

    fn cache_delete(&self, key: &LedgerKey) {
        self.cache.write().insert(key.clone(), None);
    }

    fn flush_cached(&self, key: &LedgerKey) {
        self.cache.write().remove(key);
    }

    fn check(&self, entry: &LedgerEntry) -> Result<()> {
        match self.durable.read().get(&entry.key()) {
            Some(stored) if stored == entry => Ok(()),
            Some(_) => Err(StoreError::Inconsistent(format!(
                "entry differs from stored version: {:?}",
                entry.key()
            ))),
            None => Err(StoreError::Inconsistent(format!(
                "entry missing from store: {:?}",
                entry.key()
            ))),
        }
    }

    fn trustlines_of(&self, account: &AccountId) -> Result<Vec<TrustLineEntry>> {
        let mut lines = Vec::new();
        self.for_each_of_account(account, |entry| {
            if let LedgerEntryData::Trustline(line) = &entry.data {
                lines.push(line.clone());
            }
        });
        Ok(lines)
    }

    fn offers_of(&self, account: &AccountId) -> Result<Vec<OfferEntry>> {
        let mut offers = Vec::new();
        self.for_each_of_account(account, |entry| {
            if let LedgerEntryData::Offer(offer) = &entry.data {
                offers.push(offer.clone());
            }
        });
        Ok(offers)
    }

    fn has_issued(&self, issuer: &AccountId) -> Result<bool> {
        let durable = self.durable.read();
        let cache = self.cache.read();

        let line_issued_by = |entry: &LedgerEntry| match &entry.data {
            LedgerEntryData::Trustline(line) => line.asset.issuer() == Some(issuer),
            _ => false,
        };

        for (key, entry) in durable.iter() {
            match cache.get(key) {
                Some(Some(cached)) if line_issued_by(cached) => return Ok(true),
                Some(_) => {}
                None if line_issued_by(entry) => return Ok(true),
                None => {}
            }
        }
        for (key, slot) in cache.iter() {
            if durable.contains_key(key) {
                continue;
            }
            if let Some(entry) = slot {
                if line_issued_by(entry) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
