//! Error types for the airdrop claim service

use thiserror::Error;

/// Notice shown to the user for every mint failure except a rejected broadcast
pub const GENERIC_FAILURE_NOTICE: &str = "failed to mint";

/// Main error type for the claim workflow
#[derive(Error, Debug)]
pub enum ClaimError {
    #[error("Signing service is not ready, connect() must complete first")]
    SigningServiceNotReady,

    #[error("Unknown chain: {chain}")]
    UnknownChain { chain: String },

    #[error("Signing public key not provided")]
    MissingSigningKey,

    #[error("Transaction request is missing {0}")]
    MissingField(&'static str),

    #[error("Gas estimation failed: {0}")]
    GasEstimationFailed(String),

    #[error("Signing execution failed: {0}")]
    SigningExecutionFailed(String),

    #[error("Broadcast failed: {0}")]
    BroadcastFailed(String),

    #[error("Metadata fetch failed: {0}")]
    MetadataFetchFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet is not connected")]
    WalletNotConnected,

    #[error("A mint is already in flight for this session")]
    MintInProgress,

    #[error("Session auth unavailable: {0}")]
    AuthUnavailable(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Session {0} not found")]
    SessionNotFound(String),
}

impl ClaimError {
    /// Stable label used in logs, metrics and API payloads
    pub fn kind(&self) -> &'static str {
        match self {
            ClaimError::SigningServiceNotReady => "signing_service_not_ready",
            ClaimError::UnknownChain { .. } => "unknown_chain",
            ClaimError::MissingSigningKey => "missing_signing_key",
            ClaimError::MissingField(_) => "missing_field",
            ClaimError::GasEstimationFailed(_) => "gas_estimation_failed",
            ClaimError::SigningExecutionFailed(_) => "signing_execution_failed",
            ClaimError::BroadcastFailed(_) => "broadcast_failed",
            ClaimError::MetadataFetchFailed(_) => "metadata_fetch_failed",
            ClaimError::Config(_) => "config",
            ClaimError::WalletNotConnected => "wallet_not_connected",
            ClaimError::MintInProgress => "mint_in_progress",
            ClaimError::AuthUnavailable(_) => "auth_unavailable",
            ClaimError::Timeout { .. } => "timeout",
            ClaimError::Rpc(_) => "rpc",
            ClaimError::Encoding(_) => "encoding",
            ClaimError::SessionNotFound(_) => "session_not_found",
        }
    }

    /// Check if the error aborted the attempt before anything left this process
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ClaimError::SigningServiceNotReady
                | ClaimError::UnknownChain { .. }
                | ClaimError::MissingSigningKey
                | ClaimError::MissingField(_)
                | ClaimError::WalletNotConnected
                | ClaimError::MintInProgress
        )
    }

    /// Message surfaced to the user.
    ///
    /// Only a rejected broadcast gets an explicit alert carrying the RPC text.
    pub fn user_notice(&self) -> String {
        match self {
            ClaimError::BroadcastFailed(message) => {
                format!("{}: transaction rejected: {}", GENERIC_FAILURE_NOTICE, message)
            }
            _ => GENERIC_FAILURE_NOTICE.to_string(),
        }
    }
}

/// Result type for claim operations
pub type ClaimResult<T> = Result<T, ClaimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_failure_is_explicit() {
        let err = ClaimError::BroadcastFailed("insufficient funds for gas * price + value".into());
        assert_eq!(err.kind(), "broadcast_failed");
        assert!(err.user_notice().contains("insufficient funds"));
        assert!(!err.is_precondition());
    }

    #[test]
    fn test_precondition_failures_are_generic() {
        for err in [
            ClaimError::SigningServiceNotReady,
            ClaimError::UnknownChain { chain: "nowhere".into() },
            ClaimError::MissingSigningKey,
        ] {
            assert!(err.is_precondition());
            assert_eq!(err.user_notice(), GENERIC_FAILURE_NOTICE);
        }
    }
}
