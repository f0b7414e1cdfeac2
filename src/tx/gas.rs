//! Gas estimation for claim calls

use crate::chain::ChainRpc;
use crate::error::{ClaimError, ClaimResult};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::U256;
use tracing::debug;

/// Gas estimator for transactions
pub struct GasEstimator {
    /// Safety factor applied to the node's estimate
    multiplier: u64,
}

impl GasEstimator {
    /// Create a new gas estimator
    pub fn new(multiplier: u64) -> Self {
        Self {
            multiplier: multiplier.max(1),
        }
    }

    /// Gas limit for a call: node estimate times the safety factor
    pub async fn estimate_limit(
        &self,
        rpc: &dyn ChainRpc,
        call: &TypedTransaction,
    ) -> ClaimResult<U256> {
        let estimate = rpc.estimate_gas(call).await.map_err(|e| match e {
            ClaimError::GasEstimationFailed(_) => e,
            other => ClaimError::GasEstimationFailed(other.to_string()),
        })?;

        let limit = estimate
            .checked_mul(U256::from(self.multiplier))
            .ok_or_else(|| ClaimError::GasEstimationFailed("gas limit overflow".to_string()))?;

        debug!(
            "Gas estimate {} on chain {}, limit {}",
            estimate,
            rpc.chain_id(),
            limit
        );
        Ok(limit)
    }
}

impl Default for GasEstimator {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Minimal 0x-prefixed hex quantity
pub fn to_hex_quantity(value: U256) -> String {
    format!("0x{:x}", value)
}
