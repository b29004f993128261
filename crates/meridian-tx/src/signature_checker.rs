//! Signature weight checking for multi-signature transactions.
//!
//! One [`SignatureChecker`] lives for the duration of a transaction's
//! validation or application. Every threshold check (the transaction
//! source's low threshold, then each operation source at its needed
//! threshold) consumes signatures from the same pool, and the transaction
//! fails if any provided signature was never consumed.

use meridian_common::Hash256;
use meridian_crypto::verify_signature;
use meridian_wire::{DecoratedSignature, Signer};

/// Tracks which of a transaction's signatures have been used and
/// accumulates signer weights against thresholds.
pub struct SignatureChecker<'a> {
    /// Hash of the transaction contents the signatures are over.
    contents_hash: Hash256,
    signatures: &'a [DecoratedSignature],
    used: Vec<bool>,
}

impl<'a> SignatureChecker<'a> {
    pub fn new(contents_hash: Hash256, signatures: &'a [DecoratedSignature]) -> Self {
        Self {
            contents_hash,
            signatures,
            used: vec![false; signatures.len()],
        }
    }

    /// Check whether the given signers clear `needed_weight`.
    ///
    /// Signatures are matched by hint first, then verified; each matching
    /// signature is marked used and its signer retired so one key cannot
    /// sign twice within a single check. A signature may still count again
    /// for a different threshold check (the same key can control both the
    /// transaction source and an operation source).
    pub fn check_signature(&mut self, signers: &[Signer], needed_weight: u32) -> bool {
        let mut available: Vec<Signer> = signers.to_vec();
        let mut total_weight: u32 = 0;

        for (index, sig) in self.signatures.iter().enumerate() {
            let matched = available.iter().position(|signer| {
                signer.key.hint() == sig.hint
                    && verify_signature(
                        &signer.key.0,
                        &sig.signature,
                        self.contents_hash.as_bytes(),
                    )
            });
            if let Some(signer_index) = matched {
                self.used[index] = true;
                total_weight += available[signer_index].weight;
                if total_weight >= needed_weight {
                    return true;
                }
                available.remove(signer_index);
            }
        }

        false
    }

    /// True when every provided signature was consumed by some check.
    pub fn all_signatures_used(&self) -> bool {
        self.used.iter().all(|used| *used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer as _, SigningKey};
    use meridian_wire::AccountId;

    fn keypair(seed: u8) -> (SigningKey, AccountId) {
        let signing = SigningKey::from_bytes(&[seed; 32]);
        (signing.clone(), AccountId(signing.verifying_key().to_bytes()))
    }

    fn sign(key: &SigningKey, id: &AccountId, hash: &Hash256) -> DecoratedSignature {
        DecoratedSignature {
            hint: id.hint(),
            signature: key.sign(hash.as_bytes()).to_bytes().to_vec(),
        }
    }

    #[test]
    fn test_single_signer_meets_threshold() {
        let (key, id) = keypair(1);
        let hash = Hash256::hash(b"tx");
        let sigs = vec![sign(&key, &id, &hash)];
        let mut checker = SignatureChecker::new(hash, &sigs);

        assert!(checker.check_signature(&[Signer { key: id, weight: 1 }], 1));
        assert!(checker.all_signatures_used());
    }

    #[test]
    fn test_weight_accumulates_across_signers() {
        let (key_a, id_a) = keypair(1);
        let (key_b, id_b) = keypair(2);
        let hash = Hash256::hash(b"tx");
        let sigs = vec![sign(&key_a, &id_a, &hash), sign(&key_b, &id_b, &hash)];
        let mut checker = SignatureChecker::new(hash, &sigs);

        let signers = [
            Signer { key: id_a, weight: 1 },
            Signer { key: id_b, weight: 1 },
        ];
        assert!(checker.check_signature(&signers, 2));
        assert!(checker.all_signatures_used());
    }

    #[test]
    fn test_one_key_cannot_sign_twice_in_one_check() {
        let (key, id) = keypair(1);
        let hash = Hash256::hash(b"tx");
        // the same signature twice
        let sigs = vec![sign(&key, &id, &hash), sign(&key, &id, &hash)];
        let mut checker = SignatureChecker::new(hash, &sigs);

        assert!(!checker.check_signature(&[Signer { key: id, weight: 1 }], 2));
    }

    #[test]
    fn test_unused_signature_detected() {
        let (key_a, id_a) = keypair(1);
        let (key_b, id_b) = keypair(2);
        let hash = Hash256::hash(b"tx");
        let sigs = vec![sign(&key_a, &id_a, &hash), sign(&key_b, &id_b, &hash)];
        let mut checker = SignatureChecker::new(hash, &sigs);

        assert!(checker.check_signature(&[Signer { key: id_a, weight: 1 }], 1));
        assert!(!checker.all_signatures_used());

        assert!(checker.check_signature(&[Signer { key: id_b, weight: 1 }], 1));
        assert!(checker.all_signatures_used());
    }

    #[test]
    fn test_wrong_hash_rejected() {
        let (key, id) = keypair(1);
        let hash = Hash256::hash(b"tx");
        let sigs = vec![sign(&key, &id, &Hash256::hash(b"other"))];
        let mut checker = SignatureChecker::new(hash, &sigs);

        assert!(!checker.check_signature(&[Signer { key: id, weight: 1 }], 1));
        assert!(!checker.all_signatures_used());
    }
}
