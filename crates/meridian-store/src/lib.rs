//! Entry storage for Meridian.
//!
//! The ledger core buffers all mutation in deltas; this crate provides the
//! keyed store those deltas resolve against. The store has two layers:
//!
//! - a **durable** backing, written only when a root delta commits, and
//! - a shared **cache** that also carries *uncommitted* writes, so that
//!   reads made later in the same transaction observe earlier operations.
//!
//! A delta that rolls back invalidates the cache for exactly the keys it
//! touched, which restores read coherence with the durable layer.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::MemoryStore;

use meridian_wire::{AccountId, LedgerEntry, LedgerKey, OfferEntry, TrustLineEntry};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable keyed storage of ledger entries, fronted by a shared cache.
///
/// Atomicity is the caller's concern (provided by the delta protocol); the
/// store itself promises only that `load`/`exists` and the account-scoped
/// queries observe `cache_put`/`cache_delete` writes until those slots are
/// flushed.
pub trait EntryStore {
    /// Load an entry, consulting the cache first.
    fn load(&self, key: &LedgerKey) -> Result<Option<LedgerEntry>>;

    /// Check whether an entry exists, consulting the cache first.
    fn exists(&self, key: &LedgerKey) -> Result<bool>;

    /// Durably store an entry and refresh its cache slot.
    fn put(&self, entry: &LedgerEntry) -> Result<()>;

    /// Durably delete an entry and refresh its cache slot.
    fn delete(&self, key: &LedgerKey) -> Result<()>;

    /// Record an uncommitted write in the cache only.
    fn cache_put(&self, entry: &LedgerEntry);

    /// Record an uncommitted delete (tombstone) in the cache only.
    fn cache_delete(&self, key: &LedgerKey);

    /// Drop the cache slot for a key so the next read hits durable state.
    fn flush_cached(&self, key: &LedgerKey);

    /// Verify that the durable layer holds exactly this entry.
    fn check(&self, entry: &LedgerEntry) -> Result<()>;

    /// All trustlines held by an account.
    fn trustlines_of(&self, account: &AccountId) -> Result<Vec<TrustLineEntry>>;

    /// All offers posted by an account.
    fn offers_of(&self, account: &AccountId) -> Result<Vec<OfferEntry>>;

    /// Whether anyone holds a trustline for an asset issued by this account.
    fn has_issued(&self, issuer: &AccountId) -> Result<bool>;
}
