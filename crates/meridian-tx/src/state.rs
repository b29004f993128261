//! Entry frames: typed views over ledger entries with store discipline.
//!
//! Operations never touch the delta or the store cache directly. A frame
//! loads an entry, the operation mutates the typed payload, and the frame's
//! `store_*` methods perform the three-part write: bump the entry version,
//! make the uncommitted value visible through the store cache, and record
//! the mutation in the delta. Keeping the cache in step with the delta is
//! what lets later operations in the same transaction read the effects of
//! earlier ones.

use crate::{Result, TxError};
use meridian_ledger::LedgerDelta;
use meridian_store::EntryStore;
use meridian_wire::{
    AccountEntry, AccountId, Asset, LedgerEntry, LedgerEntryData, LedgerKey, OfferEntry,
    TrustLineEntry,
};

/// Typed frame over an account entry.
pub struct AccountFrame {
    pub account: AccountEntry,
    version: u64,
}

impl AccountFrame {
    /// Wrap a brand-new account that is not in the store yet.
    pub fn new(account: AccountEntry) -> Self {
        Self {
            account,
            version: 0,
        }
    }

    /// Load an account through the store cache.
    pub fn load(store: &dyn EntryStore, id: &AccountId) -> Result<Option<Self>> {
        let key = LedgerKey::Account { account_id: *id };
        match store.load(&key)? {
            Some(LedgerEntry {
                version,
                data: LedgerEntryData::Account(account),
            }) => Ok(Some(Self { account, version })),
            Some(_) => Err(TxError::UnexpectedState(format!(
                "non-account entry behind account key {key:?}"
            ))),
            None => Ok(None),
        }
    }

    fn to_entry(&self) -> LedgerEntry {
        LedgerEntry {
            version: self.version,
            data: LedgerEntryData::Account(self.account.clone()),
        }
    }

    /// Record this account as created.
    pub fn store_add(&mut self, delta: &mut LedgerDelta<'_>, store: &dyn EntryStore) -> Result<()> {
        self.version += 1;
        let entry = self.to_entry();
        store.cache_put(&entry);
        delta.add_entry(entry)?;
        Ok(())
    }

    /// Record this account as modified.
    pub fn store_change(
        &mut self,
        delta: &mut LedgerDelta<'_>,
        store: &dyn EntryStore,
    ) -> Result<()> {
        self.version += 1;
        let entry = self.to_entry();
        store.cache_put(&entry);
        delta.mod_entry(entry)?;
        Ok(())
    }

    /// Record this account as deleted.
    pub fn store_delete(self, delta: &mut LedgerDelta<'_>, store: &dyn EntryStore) -> Result<()> {
        let key = LedgerKey::Account {
            account_id: self.account.account_id,
        };
        store.cache_delete(&key);
        delta.delete_entry(&key)?;
        Ok(())
    }
}

/// Typed frame over a trustline entry.
pub struct TrustLineFrame {
    pub line: TrustLineEntry,
    version: u64,
}

impl TrustLineFrame {
    pub fn new(line: TrustLineEntry) -> Self {
        Self { line, version: 0 }
    }

    pub fn load(
        store: &dyn EntryStore,
        account_id: &AccountId,
        asset: &Asset,
    ) -> Result<Option<Self>> {
        let key = LedgerKey::Trustline {
            account_id: *account_id,
            asset: *asset,
        };
        match store.load(&key)? {
            Some(LedgerEntry {
                version,
                data: LedgerEntryData::Trustline(line),
            }) => Ok(Some(Self { line, version })),
            Some(_) => Err(TxError::UnexpectedState(format!(
                "non-trustline entry behind trustline key {key:?}"
            ))),
            None => Ok(None),
        }
    }

    fn to_entry(&self) -> LedgerEntry {
        LedgerEntry {
            version: self.version,
            data: LedgerEntryData::Trustline(self.line.clone()),
        }
    }

    pub fn key(&self) -> LedgerKey {
        LedgerKey::Trustline {
            account_id: self.line.account_id,
            asset: self.line.asset,
        }
    }

    pub fn store_add(&mut self, delta: &mut LedgerDelta<'_>, store: &dyn EntryStore) -> Result<()> {
        self.version += 1;
        let entry = self.to_entry();
        store.cache_put(&entry);
        delta.add_entry(entry)?;
        Ok(())
    }

    pub fn store_change(
        &mut self,
        delta: &mut LedgerDelta<'_>,
        store: &dyn EntryStore,
    ) -> Result<()> {
        self.version += 1;
        let entry = self.to_entry();
        store.cache_put(&entry);
        delta.mod_entry(entry)?;
        Ok(())
    }

    pub fn store_delete(self, delta: &mut LedgerDelta<'_>, store: &dyn EntryStore) -> Result<()> {
        let key = self.key();
        store.cache_delete(&key);
        delta.delete_entry(&key)?;
        Ok(())
    }
}

/// Typed frame over an offer entry.
pub struct OfferFrame {
    pub offer: OfferEntry,
    version: u64,
}

impl OfferFrame {
    pub fn new(offer: OfferEntry) -> Self {
        Self { offer, version: 0 }
    }

    pub fn load(
        store: &dyn EntryStore,
        account_id: &AccountId,
        offer_id: u64,
    ) -> Result<Option<Self>> {
        let key = LedgerKey::Offer {
            account_id: *account_id,
            offer_id,
        };
        match store.load(&key)? {
            Some(LedgerEntry {
                version,
                data: LedgerEntryData::Offer(offer),
            }) => Ok(Some(Self { offer, version })),
            Some(_) => Err(TxError::UnexpectedState(format!(
                "non-offer entry behind offer key {key:?}"
            ))),
            None => Ok(None),
        }
    }

    fn to_entry(&self) -> LedgerEntry {
        LedgerEntry {
            version: self.version,
            data: LedgerEntryData::Offer(self.offer.clone()),
        }
    }

    pub fn key(&self) -> LedgerKey {
        LedgerKey::Offer {
            account_id: self.offer.account_id,
            offer_id: self.offer.offer_id,
        }
    }

    pub fn store_add(&mut self, delta: &mut LedgerDelta<'_>, store: &dyn EntryStore) -> Result<()> {
        self.version += 1;
        let entry = self.to_entry();
        store.cache_put(&entry);
        delta.add_entry(entry)?;
        Ok(())
    }

    pub fn store_change(
        &mut self,
        delta: &mut LedgerDelta<'_>,
        store: &dyn EntryStore,
    ) -> Result<()> {
        self.version += 1;
        let entry = self.to_entry();
        store.cache_put(&entry);
        delta.mod_entry(entry)?;
        Ok(())
    }

    pub fn store_delete(self, delta: &mut LedgerDelta<'_>, store: &dyn EntryStore) -> Result<()> {
        let key = self.key();
        store.cache_delete(&key);
        delta.delete_entry(&key)?;
        Ok(())
    }
}
