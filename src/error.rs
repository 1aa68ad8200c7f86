//! Error types for the Trato client

use ethers::types::{H256, U256};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Why the node refused a raw transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastRejection {
    NonceTooLow,
    InsufficientFunds,
    Underpriced,
    AlreadyKnown,
    Other,
}

impl BroadcastRejection {
    /// Classify a node error message
    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();
        if message.contains("nonce too low") || message.contains("nonce has already been used") {
            BroadcastRejection::NonceTooLow
        } else if message.contains("insufficient funds") {
            BroadcastRejection::InsufficientFunds
        } else if message.contains("underpriced")
            || message.contains("intrinsic gas too low")
            || message.contains("gas too low")
        {
            BroadcastRejection::Underpriced
        } else if message.contains("already known") || message.contains("known transaction") {
            BroadcastRejection::AlreadyKnown
        } else {
            BroadcastRejection::Other
        }
    }
}

impl fmt::Display for BroadcastRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BroadcastRejection::NonceTooLow => "nonce too low",
            BroadcastRejection::InsufficientFunds => "insufficient funds",
            BroadcastRejection::Underpriced => "gas price or limit too low",
            BroadcastRejection::AlreadyKnown => "already known",
            BroadcastRejection::Other => "rejected",
        };
        f.write_str(s)
    }
}

/// Main error type for the client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Gas oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Gas estimation failed: {0}")]
    EstimationFailed(String),

    #[error("Fee {fee} exceeds {reference} {limit}")]
    FeeExceeds {
        fee: U256,
        limit: U256,
        reference: &'static str,
    },

    #[error("Signing error: {0}")]
    Sign(String),

    #[error("Broadcast rejected ({reason}): {message}")]
    Broadcast {
        reason: BroadcastRejection,
        message: String,
    },

    #[error("No receipt for {tx_hash:?} after {waited:?}")]
    ReceiptTimeout { tx_hash: H256, waited: Duration },

    #[error("RPC {operation} failed: {message}")]
    Rpc {
        operation: &'static str,
        message: String,
    },

    #[error("Deployment failed: {0}")]
    DeploymentFailed(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid amount: {0}")]
    Units(String),
}

impl ClientError {
    pub(crate) fn rpc(operation: &'static str, err: impl fmt::Display) -> Self {
        ClientError::Rpc {
            operation,
            message: err.to_string(),
        }
    }

    /// Pipeline stage that produced this error, used as a metrics label
    pub fn stage(&self) -> &'static str {
        match self {
            ClientError::OracleUnavailable(_) => "gas_price",
            ClientError::EstimationFailed(_) => "estimate",
            ClientError::FeeExceeds { .. } => "fee_guard",
            ClientError::Sign(_) => "sign",
            ClientError::Broadcast { .. } => "broadcast",
            ClientError::ReceiptTimeout { .. } => "receipt",
            ClientError::Rpc { operation, .. } => operation,
            ClientError::DeploymentFailed(_) => "deploy",
            ClientError::Artifact(_) | ClientError::Abi(_) => "encode",
            ClientError::Config(_) | ClientError::Units(_) => "input",
        }
    }

    /// Check if a caller-level retry could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::OracleUnavailable(_)
                | ClientError::ReceiptTimeout { .. }
                | ClientError::Rpc { .. }
                | ClientError::Broadcast {
                    reason: BroadcastRejection::Underpriced,
                    ..
                }
        )
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
