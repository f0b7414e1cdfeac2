//! Session auth for the signing network

use super::AuthAssertion;
use crate::error::{ClaimError, ClaimResult};

use async_trait::async_trait;
use ethers::types::Address;
use tracing::warn;

/// Issues the AuthAssertion presented with every signing request
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn obtain_session_auth(&self, address: Address) -> ClaimResult<AuthAssertion>;
}

/// Serves a pre-issued assertion from configuration.
///
/// Stand-in until assertions are issued per session by a wallet signing step.
pub struct ConfiguredAuth {
    assertion: Option<AuthAssertion>,
}

impl ConfiguredAuth {
    pub fn new(assertion: Option<AuthAssertion>) -> Self {
        Self { assertion }
    }
}

#[async_trait]
impl AuthProvider for ConfiguredAuth {
    async fn obtain_session_auth(&self, address: Address) -> ClaimResult<AuthAssertion> {
        let assertion = self.assertion.clone().ok_or_else(|| {
            ClaimError::AuthUnavailable("no auth assertion configured".to_string())
        })?;

        warn!(
            "Using configured placeholder auth assertion (issued to {}) for session {:?}",
            assertion.address, address
        );

        Ok(assertion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_assertion() {
        let auth = ConfiguredAuth::new(None);
        let result = auth.obtain_session_auth(Address::zero()).await;
        assert!(matches!(result, Err(ClaimError::AuthUnavailable(_))));
    }

    #[tokio::test]
    async fn test_configured_assertion_returned() {
        let assertion = AuthAssertion {
            sig: "0x01".into(),
            derived_via: "web3.eth.personal.sign".into(),
            signed_message: "sign in".into(),
            address: "0x35ae1BDaBcbAa739A95ddb8A33fA6Db5ad2EC492".into(),
        };
        let auth = ConfiguredAuth::new(Some(assertion.clone()));
        let got = tokio_test::assert_ok!(auth.obtain_session_auth(Address::zero()).await);
        assert_eq!(got, assertion);
    }
}
