//! Error types for SCP.

use thiserror::Error;

/// Errors that can occur in the consensus core.
#[derive(Debug, Error)]
pub enum ScpError {
    /// Envelope rejected at the slot boundary.
    #[error("invalid envelope: {0}")]
    EnvelopeInvalid(String),

    /// Quorum set failed structural validation.
    #[error("invalid quorum set: {0}")]
    InvalidQuorumSet(String),
}
