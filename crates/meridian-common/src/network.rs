//! Network identity types.

use crate::types::Hash256;
use serde::{Deserialize, Serialize};

/// Network identifier derived from the network passphrase.
///
/// The network id is mixed into every transaction hash so that signatures
/// made for one network cannot be replayed on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkId(pub Hash256);

impl NetworkId {
    /// Create a network ID from a passphrase.
    pub fn from_passphrase(passphrase: &str) -> Self {
        Self(Hash256::hash(passphrase.as_bytes()))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Meridian public test network.
    pub fn testnet() -> Self {
        Self::from_passphrase("Meridian Test Network ; March 2024")
    }

    /// Meridian public main network.
    pub fn mainnet() -> Self {
        Self::from_passphrase("Meridian Global Payment Network ; March 2024")
    }
}
