//! Error types for wallet handoff operations
//!
//! Two layers of errors live here. [`WalletError`] is what a Wallet Interface
//! implementation reports for a failed call. [`HandoffError`] is the taxonomy
//! the lifecycle manager, key linkage deriver and handoff orchestrator surface
//! to their callers; every variant is distinguishable by [`ErrorKind`] so a
//! caller can decide whether to re-derive, re-send or abandon.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data_structures::Network;

/// Named failures reported by a Wallet Interface implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("Invalid argument '{parameter}': {reason}")]
    InvalidArgument { parameter: String, reason: String },

    #[error("Unknown action reference: {0}")]
    UnknownReference(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Claim rejected for output {output_index}: {reason}")]
    ClaimRejected { output_index: u32, reason: String },

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),
}

impl WalletError {
    pub fn invalid_argument(parameter: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::Serialization(err.to_string())
    }
}

impl From<hex::FromHexError> for WalletError {
    fn from(err: hex::FromHexError) -> Self {
        WalletError::Serialization(err.to_string())
    }
}

pub type WalletResult<T> = Result<T, WalletError>;

/// Fieldless discriminant of [`HandoffError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidSpec,
    UnknownReference,
    ConcurrentMutation,
    NetworkMismatch,
    DerivationError,
    ClaimRejected,
    Wallet,
    Serialization,
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidSpec => "InvalidSpec",
            ErrorKind::UnknownReference => "UnknownReference",
            ErrorKind::ConcurrentMutation => "ConcurrentMutation",
            ErrorKind::NetworkMismatch => "NetworkMismatch",
            ErrorKind::DerivationError => "DerivationError",
            ErrorKind::ClaimRejected => "ClaimRejected",
            ErrorKind::Wallet => "Wallet",
            ErrorKind::Serialization => "Serialization",
            ErrorKind::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the action lifecycle, key linkage and handoff layers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandoffError {
    #[error("Invalid action request: {0}")]
    InvalidSpec(String),

    #[error("Unknown or terminal action reference: {0}")]
    UnknownReference(String),

    #[error("Concurrent mutation of action reference: {0}")]
    ConcurrentMutation(String),

    #[error("Network mismatch: local endpoint is on {local}, remote endpoint is on {remote}")]
    NetworkMismatch { local: Network, remote: Network },

    #[error("Key derivation failed: {0}")]
    DerivationError(String),

    #[error("Claim rejected: {0}")]
    ClaimRejected(String),

    #[error("Wallet error: {0}")]
    Wallet(WalletError),

    #[error("Payload serialization error: {0}")]
    Serialization(String),

    #[error("Handoff cancelled before {0}")]
    Cancelled(String),
}

impl HandoffError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandoffError::InvalidSpec(_) => ErrorKind::InvalidSpec,
            HandoffError::UnknownReference(_) => ErrorKind::UnknownReference,
            HandoffError::ConcurrentMutation(_) => ErrorKind::ConcurrentMutation,
            HandoffError::NetworkMismatch { .. } => ErrorKind::NetworkMismatch,
            HandoffError::DerivationError(_) => ErrorKind::DerivationError,
            HandoffError::ClaimRejected(_) => ErrorKind::ClaimRejected,
            HandoffError::Wallet(_) => ErrorKind::Wallet,
            HandoffError::Serialization(_) => ErrorKind::Serialization,
            HandoffError::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    /// Only a racing sign/abort may be retried, after re-fetching state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HandoffError::ConcurrentMutation(_))
    }
}

impl From<WalletError> for HandoffError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::UnknownReference(reference) => HandoffError::UnknownReference(reference),
            WalletError::ClaimRejected {
                output_index,
                reason,
            } => HandoffError::ClaimRejected(format!("output {output_index}: {reason}")),
            WalletError::InvalidPublicKey(msg) => HandoffError::DerivationError(msg),
            WalletError::InvalidArgument { parameter, reason } => {
                HandoffError::InvalidSpec(format!("{parameter}: {reason}"))
            }
            other => HandoffError::Wallet(other),
        }
    }
}

impl From<serde_json::Error> for HandoffError {
    fn from(err: serde_json::Error) -> Self {
        HandoffError::Serialization(err.to_string())
    }
}

pub type HandoffResult<T> = Result<T, HandoffError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_errors_map_onto_taxonomy() {
        let err: HandoffError = WalletError::UnknownReference("abc".into()).into();
        assert_eq!(err.kind(), ErrorKind::UnknownReference);

        let err: HandoffError = WalletError::ClaimRejected {
            output_index: 0,
            reason: "script mismatch".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::ClaimRejected);
        assert!(err.to_string().contains("script mismatch"));

        let err: HandoffError = WalletError::InvalidPublicKey("zz".into()).into();
        assert_eq!(err.kind(), ErrorKind::DerivationError);

        let err: HandoffError = WalletError::invalid_argument("outputs", "empty").into();
        assert_eq!(err.kind(), ErrorKind::InvalidSpec);

        let err: HandoffError = WalletError::InsufficientFunds("need 10".into()).into();
        assert_eq!(err.kind(), ErrorKind::Wallet);
    }

    #[test]
    fn test_only_concurrent_mutation_is_retryable() {
        assert!(HandoffError::ConcurrentMutation("r".into()).is_retryable());
        assert!(!HandoffError::ClaimRejected("x".into()).is_retryable());
        assert!(!HandoffError::NetworkMismatch {
            local: Network::Main,
            remote: Network::Test
        }
        .is_retryable());
    }
}
