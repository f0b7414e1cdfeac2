//! Transaction sender: threshold-signs a request and broadcasts it
//!
//! One call is one linear pipeline: preflight, build the signing action,
//! execute it on the signing network, rebuild the signed envelope, broadcast.
//! Nothing is retried.

use super::envelope::UnsignedFields;
use super::request::TxRequest;
use crate::chain::{ChainInfo, ChainRegistry, ChainRpc};
use crate::error::{ClaimError, ClaimResult};
use crate::signing::{ActionParams, AuthAssertion, ExecuteRequest, SigningAction, SigningService};

use ethers::types::TxHash;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Handle of a broadcast transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransactionHandle {
    pub hash: TxHash,
}

/// Signs through the signing network and submits through the chain RPC
pub struct TransactionSender {
    signing: Arc<dyn SigningService>,
    rpc: Arc<dyn ChainRpc>,
    registry: Arc<ChainRegistry>,
    /// Name the signature is stored under in the execute result
    signature_name: String,
    /// No client-side limit when unset
    execute_timeout: Option<Duration>,
}

impl TransactionSender {
    pub fn new(
        signing: Arc<dyn SigningService>,
        rpc: Arc<dyn ChainRpc>,
        registry: Arc<ChainRegistry>,
        signature_name: &str,
    ) -> Self {
        Self {
            signing,
            rpc,
            registry,
            signature_name: signature_name.to_string(),
            execute_timeout: None,
        }
    }

    pub fn with_execute_timeout(mut self, execute_timeout: Option<Duration>) -> Self {
        self.execute_timeout = execute_timeout;
        self
    }

    /// Checks that must pass before any network call, in order
    pub fn preflight(&self, request: &TxRequest) -> ClaimResult<ChainInfo> {
        if !self.signing.is_ready() {
            error!(
                "Signing network {} is not ready, connect() must complete first",
                self.signing.network()
            );
            return Err(ClaimError::SigningServiceNotReady);
        }

        let chain = self.registry.resolve(&request.chain).map_err(|e| {
            error!("Invalid chain {}", request.chain);
            e
        })?;

        if request.signing_public_key.trim().is_empty() {
            error!("Public key not provided");
            return Err(ClaimError::MissingSigningKey);
        }

        Ok(chain.clone())
    }

    /// Sign and broadcast a request. Exactly one broadcast attempt per call.
    pub async fn send(
        &self,
        request: &TxRequest,
        auth: &AuthAssertion,
    ) -> ClaimResult<TransactionHandle> {
        let chain = self.preflight(request)?;
        let to = request.recipient()?;
        let data = request.payload()?.clone();

        let params = ActionParams {
            public_key: request.signing_public_key.clone(),
            chain: chain.name.clone(),
            sig_name: self.signature_name.clone(),
            chain_id: chain.chain_id,
            to,
            value: request.value.clone(),
            data,
            gas_price: request.gas_price_or_default(),
            gas_limit: request.gas_limit_or_default(),
        };

        let execute = ExecuteRequest {
            code: SigningAction::sign_transaction().to_code()?,
            auth_sig: auth.clone(),
            js_params: params,
        };

        debug!(
            "Requesting signature {} on {} for chain {}",
            self.signature_name,
            self.signing.network(),
            chain.name
        );

        let started = Instant::now();
        let result = match self.execute_timeout {
            Some(limit) => timeout(limit, self.signing.execute(execute))
                .await
                .map_err(|_| ClaimError::Timeout {
                    operation: "signing action".to_string(),
                })??,
            None => self.signing.execute(execute).await?,
        };
        crate::metrics::record_signing_latency(started.elapsed().as_secs_f64());

        let fields = UnsignedFields::from_response(&result.response)?;
        if fields.chain_id != chain.chain_id {
            warn!(
                "Signed fields carry chain {} but {} was requested",
                fields.chain_id, chain.chain_id
            );
            return Err(ClaimError::SigningExecutionFailed(format!(
                "signed for chain {}, expected {}",
                fields.chain_id, chain.chain_id
            )));
        }

        let share = result.signatures.get(&self.signature_name).ok_or_else(|| {
            ClaimError::SigningExecutionFailed(format!(
                "no signature named {} in result",
                self.signature_name
            ))
        })?;
        let signature = share.to_signature()?;

        let raw = fields.encode_signed(&signature)?;
        debug!("Broadcasting {} bytes with nonce {}", raw.len(), fields.nonce);

        let hash = self.rpc.send_raw_transaction(raw).await?;
        info!("Broadcast transaction {:?} on {}", hash, chain.name);

        Ok(TransactionHandle { hash })
    }
}
