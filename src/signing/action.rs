//! Signing action sent to the network for execution
//!
//! Steps run in order inside the signing network. Every value they need
//! comes from [`ActionParams`](super::ActionParams); the nonce is read by
//! the network itself at execution time.

use crate::error::{ClaimError, ClaimResult};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStep {
    /// Derive the sender address from `publicKey`
    ComputeAddress,
    /// Read the sender's latest nonce on `chain`
    FetchLatestNonce,
    /// Build nonce, gasPrice, gasLimit, to, value, chainId, data
    AssembleTransaction,
    /// Declare the assembled fields as the action response
    SetResponse,
    /// RLP-encode the unsigned transaction (EIP-155)
    SerializeTransaction,
    /// keccak-256 of the serialized bytes
    HashSerialized,
    /// ECDSA over the hash under `publicKey`, stored as `sigName`
    SignEcdsa,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningAction {
    pub name: String,
    pub steps: Vec<ActionStep>,
}

impl SigningAction {
    /// Sign a legacy transaction with a freshly fetched nonce
    pub fn sign_transaction() -> Self {
        Self {
            name: "sign_transaction".to_string(),
            steps: vec![
                ActionStep::ComputeAddress,
                ActionStep::FetchLatestNonce,
                ActionStep::AssembleTransaction,
                ActionStep::SetResponse,
                ActionStep::SerializeTransaction,
                ActionStep::HashSerialized,
                ActionStep::SignEcdsa,
            ],
        }
    }

    pub fn to_code(&self) -> ClaimResult<String> {
        serde_json::to_string(self).map_err(|e| ClaimError::Encoding(e.to_string()))
    }

    pub fn from_code(code: &str) -> ClaimResult<Self> {
        serde_json::from_str(code)
            .map_err(|e| ClaimError::SigningExecutionFailed(format!("Unreadable action: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_fetched_before_signing() {
        let action = SigningAction::sign_transaction();
        let position = |step| action.steps.iter().position(|s| *s == step).unwrap();

        assert!(position(ActionStep::FetchLatestNonce) < position(ActionStep::AssembleTransaction));
        assert!(position(ActionStep::SetResponse) < position(ActionStep::SignEcdsa));
        assert_eq!(action.steps.last(), Some(&ActionStep::SignEcdsa));
    }

    #[test]
    fn test_code_is_stable_json() {
        let code = SigningAction::sign_transaction().to_code().unwrap();
        assert!(code.contains("\"fetch_latest_nonce\""));
        assert_eq!(
            SigningAction::from_code(&code).unwrap(),
            SigningAction::sign_transaction()
        );
    }

    #[test]
    fn test_garbage_code_fails_execution() {
        assert!(matches!(
            SigningAction::from_code("(async () => {})()"),
            Err(ClaimError::SigningExecutionFailed(_))
        ));
    }
}
