//! Canonical binary encoding.
//!
//! Hashes and signatures are computed over these bytes, so the encoding must
//! be deterministic: same value, same bytes, on every node.

use serde::Serialize;

/// Serialize a value to its canonical byte representation.
///
/// bincode with default options is deterministic for the fixed-layout types
/// in this crate (no floats, no maps).
pub fn canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    bincode::serialize(value).expect("wire types are always serializable")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountId, Asset, LedgerKey};

    #[test]
    fn test_canonical_bytes_deterministic() {
        let key = LedgerKey::Trustline {
            account_id: AccountId([7u8; 32]),
            asset: Asset::credit(*b"USD\0", AccountId([9u8; 32])),
        };
        assert_eq!(canonical_bytes(&key), canonical_bytes(&key.clone()));
    }

    #[test]
    fn test_different_values_differ() {
        let a = LedgerKey::Account {
            account_id: AccountId([1u8; 32]),
        };
        let b = LedgerKey::Account {
            account_id: AccountId([2u8; 32]),
        };
        assert_ne!(canonical_bytes(&a), canonical_bytes(&b));
    }
}
