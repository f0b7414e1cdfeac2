//! Claim flow: turns "mint for this address" into a broadcast transaction

mod call;

pub use call::ClaimCall;

use crate::chain::ChainRpc;
use crate::config::Settings;
use crate::error::ClaimResult;
use crate::metadata::MetadataCatalog;
use crate::signing::{AuthAssertion, SigningService};
use crate::tx::{to_hex_quantity, GasEstimator, TransactionHandle, TransactionSender, TxRequest};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fixed parameters of the airdrop being claimed
#[derive(Debug, Clone)]
pub struct ClaimParams {
    pub chain: String,
    pub contract: Address,
    pub signing_public_key: String,
    pub gas_price: String,
    /// Placeholder limit carried until the estimate replaces it
    pub fallback_gas_limit: String,
    pub drop_id: u64,
    pub quantity: u64,
}

impl ClaimParams {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            chain: settings.claim.chain.clone(),
            contract: settings.contract_address(),
            signing_public_key: settings.claim.signing_public_key.clone(),
            gas_price: settings.claim.gas_price.clone(),
            fallback_gas_limit: settings.claim.fallback_gas_limit.clone(),
            drop_id: settings.claim.drop_id,
            quantity: settings.claim.quantity,
        }
    }
}

/// Result of a successful mint
#[derive(Debug, Clone)]
pub struct MintOutcome {
    pub handle: TransactionHandle,
    pub metadata_uri: String,
}

/// Everything one mint attempt needs; shared by all sessions
pub struct MintFlow {
    params: ClaimParams,
    catalog: Arc<MetadataCatalog>,
    signing: Arc<dyn SigningService>,
    rpc: Arc<dyn ChainRpc>,
    gas: GasEstimator,
    sender: TransactionSender,
}

impl MintFlow {
    pub fn new(
        params: ClaimParams,
        catalog: Arc<MetadataCatalog>,
        signing: Arc<dyn SigningService>,
        rpc: Arc<dyn ChainRpc>,
        gas: GasEstimator,
        sender: TransactionSender,
    ) -> Self {
        Self {
            params,
            catalog,
            signing,
            rpc,
            gas,
            sender,
        }
    }

    /// Claim one token for `receiver`, signing through the threshold network
    pub async fn mint<R: Rng + ?Sized>(
        &self,
        receiver: Address,
        auth: &AuthAssertion,
        rng: &mut R,
    ) -> ClaimResult<MintOutcome> {
        if let Err(e) = self.signing.connect().await {
            warn!("Signing network {} connect failed: {}", self.signing.network(), e);
        }

        let base = TxRequest::new(&self.params.chain, &self.params.signing_public_key)
            .to(self.params.contract)
            .gas_price(&self.params.gas_price)
            .gas_limit(&self.params.fallback_gas_limit);
        self.sender.preflight(&base)?;

        let (index, uri) = self.catalog.pick(rng);
        let metadata_uri = uri.to_string();
        debug!("Picked metadata #{} {}", index, metadata_uri);

        let data = ClaimCall::open(self.params.drop_id, receiver, self.params.quantity, &metadata_uri)
            .encode()?;

        let call = TypedTransaction::Legacy(
            TransactionRequest::new()
                .from(receiver)
                .to(self.params.contract)
                .data(data.clone()),
        );
        let gas_limit = self.gas.estimate_limit(self.rpc.as_ref(), &call).await?;

        let request = base.value("0x").data(data).gas_limit(&to_hex_quantity(gas_limit));
        let handle = self.sender.send(&request, auth).await?;

        info!("Minted for {:?}: {:?}", receiver, handle.hash);
        Ok(MintOutcome {
            handle,
            metadata_uri,
        })
    }
}
