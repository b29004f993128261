//! Hashing and signature verification.
//!
//! The consensus and transaction cores treat cryptography as a collaborator:
//! everything they need is covered by [`sha256`] and [`verify_signature`].

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use meridian_common::Hash256;

/// SHA-256 of a byte slice.
pub fn sha256(data: &[u8]) -> Hash256 {
    Hash256::hash(data)
}

/// Verify an ed25519 signature over `message` by the key `public_key`.
///
/// Returns false for malformed keys or signatures; a garbage signature is a
/// verification failure, not an error.
pub fn verify_signature(public_key: &[u8; 32], signature: &[u8], message: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}
