//! Chain RPC client used for gas estimation, nonce lookup and broadcast

use crate::error::{ClaimError, ClaimResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Operations the claim workflow needs from a chain node
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Estimate gas for a contract call
    async fn estimate_gas(&self, call: &TypedTransaction) -> ClaimResult<U256>;

    /// Latest transaction count for an account
    async fn transaction_count(&self, address: Address) -> ClaimResult<u64>;

    /// Broadcast a signed, serialized transaction
    async fn send_raw_transaction(&self, raw: Bytes) -> ClaimResult<TxHash>;

    /// Chain ID this client talks to
    fn chain_id(&self) -> u64;
}

/// JSON-RPC provider over HTTP
pub struct ChainProvider {
    chain_id: u64,
    http: Provider<Http>,
}

impl ChainProvider {
    /// Create a new chain provider
    pub fn new(url: &str, chain_id: u64) -> ClaimResult<Self> {
        let http = Provider::<Http>::try_from(url)
            .map_err(|e| ClaimError::Config(format!("Invalid RPC url {}: {}", url, e)))?
            .interval(Duration::from_millis(500));

        info!("RPC provider for chain {}: {}", chain_id, url);

        Ok(Self { chain_id, http })
    }
}

#[async_trait]
impl ChainRpc for ChainProvider {
    async fn estimate_gas(&self, call: &TypedTransaction) -> ClaimResult<U256> {
        let gas = self
            .http
            .estimate_gas(call, None)
            .await
            .map_err(|e| ClaimError::GasEstimationFailed(e.to_string()))?;

        debug!("Estimated gas on chain {}: {}", self.chain_id, gas);
        Ok(gas)
    }

    async fn transaction_count(&self, address: Address) -> ClaimResult<u64> {
        let nonce = self
            .http
            .get_transaction_count(address, Some(BlockNumber::Latest.into()))
            .await
            .map_err(|e| ClaimError::Rpc(e.to_string()))?;

        Ok(nonce.as_u64())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> ClaimResult<TxHash> {
        match self.http.send_raw_transaction(raw).await {
            Ok(pending_tx) => {
                let tx_hash = pending_tx.tx_hash();
                info!("Transaction sent on chain {}: {:?}", self.chain_id, tx_hash);
                Ok(tx_hash)
            }
            Err(e) => {
                // Surfaced verbatim: insufficient funds, nonce too low, node down...
                warn!("Chain {} rejected transaction: {}", self.chain_id, e);
                Err(ClaimError::BroadcastFailed(e.to_string()))
            }
        }
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_url() {
        let result = ChainProvider::new("not a url", 80001);
        assert!(matches!(result, Err(ClaimError::Config(_))));
    }

    #[test]
    fn test_keeps_chain_id() {
        let provider = ChainProvider::new("http://localhost:8545", 80001).unwrap();
        assert_eq!(provider.chain_id(), 80001);
    }
}
