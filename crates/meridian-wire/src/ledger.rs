//! Ledger entries, keys and the ledger header.

use meridian_common::Hash256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identifier: ed25519 public key bytes.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// The last four bytes of the key, used as a signature hint.
    pub fn hint(&self) -> [u8; 4] {
        let mut hint = [0u8; 4];
        hint.copy_from_slice(&self.0[28..]);
        hint
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // first four bytes are enough to tell accounts apart in logs
        write!(
            f,
            "AccountId({:02x}{:02x}{:02x}{:02x})",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Account control flags.
pub const AUTH_REQUIRED_FLAG: u32 = 0x1;
/// Issuer may revoke existing trustline authorizations.
pub const AUTH_REVOCABLE_FLAG: u32 = 0x2;

/// Trustline flag: holder is authorized to hold the asset.
pub const TRUSTLINE_AUTHORIZED_FLAG: u32 = 0x1;

/// An asset: the native token or credit issued by an account.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Asset {
    /// The network's native token.
    Native,
    /// Credit issued by `issuer` under a 4-byte code.
    Credit { code: [u8; 4], issuer: AccountId },
}

impl Asset {
    /// Construct a credit asset.
    pub fn credit(code: [u8; 4], issuer: AccountId) -> Self {
        Asset::Credit { code, issuer }
    }

    /// Issuer of the asset, if any.
    pub fn issuer(&self) -> Option<&AccountId> {
        match self {
            Asset::Native => None,
            Asset::Credit { issuer, .. } => Some(issuer),
        }
    }

    /// True for the native token.
    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }
}

/// Identifies a ledger entry. Equality and hashing are structural.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum LedgerKey {
    /// An account entry.
    Account { account_id: AccountId },
    /// A trustline held by `account_id` for `asset`.
    Trustline { account_id: AccountId, asset: Asset },
    /// An offer posted by `account_id`.
    Offer { account_id: AccountId, offer_id: u64 },
}

/// Signer on an account, with its voting weight.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Signer {
    pub key: AccountId,
    pub weight: u32,
}

/// Signing thresholds: `[master_weight, low, medium, high]`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Thresholds(pub [u8; 4]);

impl Thresholds {
    pub fn master_weight(&self) -> u32 {
        self.0[0] as u32
    }

    pub fn low(&self) -> u32 {
        self.0[1] as u32
    }

    pub fn medium(&self) -> u32 {
        self.0[2] as u32
    }

    pub fn high(&self) -> u32 {
        self.0[3] as u32
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        // master key alone clears every threshold
        Thresholds([1, 0, 0, 0])
    }
}

/// Account state: balance, sequence number, signers and thresholds.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AccountEntry {
    pub account_id: AccountId,
    pub balance: i64,
    pub seq_num: i64,
    /// Number of sub-entries (trustlines, offers, signers) charged against
    /// the reserve.
    pub num_sub_entries: u32,
    pub inflation_dest: Option<AccountId>,
    pub flags: u32,
    pub home_domain: String,
    pub thresholds: Thresholds,
    pub signers: Vec<Signer>,
}

impl AccountEntry {
    /// A fresh account with the given balance and defaults everywhere else.
    pub fn new(account_id: AccountId, balance: i64) -> Self {
        Self {
            account_id,
            balance,
            seq_num: 0,
            num_sub_entries: 0,
            inflation_dest: None,
            flags: 0,
            home_domain: String::new(),
            thresholds: Thresholds::default(),
            signers: Vec::new(),
        }
    }

    /// Minimum balance the account must retain given its sub-entry count.
    pub fn min_balance(&self, header: &LedgerHeader) -> i64 {
        (2 + self.num_sub_entries as i64) * header.base_reserve as i64
    }

    /// The signer list including the master key at its master weight.
    ///
    /// A master weight of zero removes the master key from the list.
    pub fn signers_with_master(&self) -> Vec<Signer> {
        let mut signers = Vec::with_capacity(self.signers.len() + 1);
        if self.thresholds.master_weight() > 0 {
            signers.push(Signer {
                key: self.account_id,
                weight: self.thresholds.master_weight(),
            });
        }
        signers.extend(self.signers.iter().copied());
        signers
    }
}

/// Trustline: a holder's balance of an issued asset, bounded by a limit.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TrustLineEntry {
    pub account_id: AccountId,
    pub asset: Asset,
    pub balance: i64,
    pub limit: i64,
    pub flags: u32,
}

impl TrustLineEntry {
    pub fn is_authorized(&self) -> bool {
        self.flags & TRUSTLINE_AUTHORIZED_FLAG != 0
    }
}

/// Price as a rational number (`n`/`d` units of buying per unit of selling).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Price {
    pub n: i32,
    pub d: i32,
}

/// An open offer to exchange `selling` for `buying`.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct OfferEntry {
    pub account_id: AccountId,
    pub offer_id: u64,
    pub selling: Asset,
    pub buying: Asset,
    pub amount: i64,
    pub price: Price,
}

/// The concrete state behind a [`LedgerKey`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum LedgerEntryData {
    Account(AccountEntry),
    Trustline(TrustLineEntry),
    Offer(OfferEntry),
}

/// A ledger entry together with its mutation counter.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Incremented on every stored mutation.
    pub version: u64,
    pub data: LedgerEntryData,
}

impl LedgerEntry {
    pub fn account(entry: AccountEntry) -> Self {
        Self {
            version: 0,
            data: LedgerEntryData::Account(entry),
        }
    }

    pub fn trustline(entry: TrustLineEntry) -> Self {
        Self {
            version: 0,
            data: LedgerEntryData::Trustline(entry),
        }
    }

    pub fn offer(entry: OfferEntry) -> Self {
        Self {
            version: 0,
            data: LedgerEntryData::Offer(entry),
        }
    }

    /// The key identifying this entry.
    pub fn key(&self) -> LedgerKey {
        match &self.data {
            LedgerEntryData::Account(account) => LedgerKey::Account {
                account_id: account.account_id,
            },
            LedgerEntryData::Trustline(line) => LedgerKey::Trustline {
                account_id: line.account_id,
                asset: line.asset,
            },
            LedgerEntryData::Offer(offer) => LedgerKey::Offer {
                account_id: offer.account_id,
                offer_id: offer.offer_id,
            },
        }
    }

    /// Bump the mutation counter.
    pub fn touch(&mut self) {
        self.version += 1;
    }
}

/// Per-ledger metadata. Mutated only through a delta's header view.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LedgerHeader {
    pub ledger_seq: u32,
    pub previous_ledger_hash: Hash256,
    pub close_time: u64,
    pub base_fee: u32,
    pub base_reserve: u32,
    pub tx_set_hash: Hash256,
    /// Fees collected, pending inflation distribution.
    pub fee_pool: i64,
    pub total_coins: i64,
    /// Last allocated object id (offers).
    pub id_pool: u64,
    pub inflation_last_run: u64,
}

impl Default for LedgerHeader {
    fn default() -> Self {
        Self {
            ledger_seq: 1,
            previous_ledger_hash: Hash256::ZERO,
            close_time: 0,
            base_fee: 100,
            base_reserve: 10_000_000,
            tx_set_hash: Hash256::ZERO,
            fee_pool: 0,
            total_coins: 1_000_000_000_0000000,
            id_pool: 0,
            inflation_last_run: 0,
        }
    }
}
