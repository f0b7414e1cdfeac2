//! Local stand-in for the signing network
//!
//! Runs [`SigningAction`] steps in-process with a key from the environment.
//! Meant for devnets and tests; production signing goes through the gateway.

use super::action::{ActionStep, SigningAction};
use super::keys::public_key_to_address;
use super::{ExecuteRequest, ExecuteResponse, SignatureShare, SigningService};
use crate::chain::ChainRpc;
use crate::error::{ClaimError, ClaimResult};
use crate::tx::{parse_quantity, UnsignedFields};

use async_trait::async_trait;
use ethers::core::k256::elliptic_curve::sec1::ToEncodedPoint;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Intermediate values produced while running an action
#[derive(Default)]
struct ActionRun {
    sender: Option<Address>,
    nonce: Option<U256>,
    fields: Option<UnsignedFields>,
    response: serde_json::Value,
    serialized: Option<Bytes>,
    hash: Option<H256>,
    signatures: HashMap<String, SignatureShare>,
}

fn out_of_order(step: ActionStep, needs: &str) -> ClaimError {
    ClaimError::SigningExecutionFailed(format!("{:?} needs {} first", step, needs))
}

pub struct LocalSigningService {
    wallet: LocalWallet,
    public_key: String,
    rpc: Arc<dyn ChainRpc>,
    network: String,
    ready: AtomicBool,
}

impl LocalSigningService {
    /// Create from a hex private key held in an environment variable
    pub fn from_env(var_name: &str, rpc: Arc<dyn ChainRpc>) -> ClaimResult<Self> {
        let key_hex = std::env::var(var_name).map_err(|_| {
            ClaimError::Config(format!(
                "Environment variable {} not set. Required for local signing.",
                var_name
            ))
        })?;

        Self::from_hex(&key_hex, rpc)
    }

    pub fn from_hex(key_hex: &str, rpc: Arc<dyn ChainRpc>) -> ClaimResult<Self> {
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);
        let wallet: LocalWallet = key_hex
            .parse()
            .map_err(|e| ClaimError::Config(format!("Invalid private key: {}", e)))?;

        let point = wallet.signer().verifying_key().to_encoded_point(false);
        let public_key = format!("0x{}", hex::encode(point.as_bytes()));

        info!("Local signer ready for {:?}", wallet.address());

        Ok(Self {
            wallet,
            public_key,
            rpc,
            network: "local".to_string(),
            ready: AtomicBool::new(false),
        })
    }

    /// Uncompressed public key of the local signer
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn run_step(
        &self,
        step: ActionStep,
        request: &ExecuteRequest,
        run: &mut ActionRun,
    ) -> ClaimResult<()> {
        let params = &request.js_params;

        match step {
            ActionStep::ComputeAddress => {
                run.sender = Some(public_key_to_address(&params.public_key)?);
            }
            ActionStep::FetchLatestNonce => {
                let sender = run.sender.ok_or_else(|| out_of_order(step, "an address"))?;
                let nonce = self
                    .rpc
                    .transaction_count(sender)
                    .await
                    .map_err(|e| ClaimError::SigningExecutionFailed(format!("nonce lookup: {}", e)))?;
                debug!("Latest nonce for {:?}: {}", sender, nonce);
                run.nonce = Some(U256::from(nonce));
            }
            ActionStep::AssembleTransaction => {
                let nonce = run.nonce.ok_or_else(|| out_of_order(step, "a nonce"))?;
                run.fields = Some(UnsignedFields {
                    nonce,
                    gas_price: parse_quantity(&params.gas_price)?,
                    gas_limit: parse_quantity(&params.gas_limit)?,
                    to: params.to,
                    value: parse_quantity(&params.value)?,
                    chain_id: params.chain_id,
                    data: params.data.clone(),
                });
            }
            ActionStep::SetResponse => {
                let fields = run.fields.as_ref().ok_or_else(|| out_of_order(step, "fields"))?;
                run.response = serde_json::to_value(fields)
                    .map_err(|e| ClaimError::SigningExecutionFailed(e.to_string()))?;
            }
            ActionStep::SerializeTransaction => {
                let fields = run.fields.as_ref().ok_or_else(|| out_of_order(step, "fields"))?;
                run.serialized = Some(fields.serialize_unsigned());
            }
            ActionStep::HashSerialized => {
                let serialized = run
                    .serialized
                    .as_ref()
                    .ok_or_else(|| out_of_order(step, "serialized bytes"))?;
                run.hash = Some(H256::from(keccak256(serialized)));
            }
            ActionStep::SignEcdsa => {
                let hash = run.hash.ok_or_else(|| out_of_order(step, "a hash"))?;
                if public_key_to_address(&params.public_key)? != self.wallet.address() {
                    return Err(ClaimError::SigningExecutionFailed(
                        "public key is not held by this signer".to_string(),
                    ));
                }
                let signature = self
                    .wallet
                    .sign_hash(hash)
                    .map_err(|e| ClaimError::SigningExecutionFailed(e.to_string()))?;
                run.signatures.insert(
                    params.sig_name.clone(),
                    SignatureShare::from_signature(&signature, &self.public_key),
                );
            }
        }

        Ok(())
    }
}

#[async_trait]
impl SigningService for LocalSigningService {
    async fn connect(&self) -> ClaimResult<()> {
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn execute(&self, request: ExecuteRequest) -> ClaimResult<ExecuteResponse> {
        if !self.is_ready() {
            return Err(ClaimError::SigningServiceNotReady);
        }

        let action = SigningAction::from_code(&request.code)?;
        let mut run = ActionRun::default();

        for step in action.steps.iter().copied() {
            self.run_step(step, &request, &mut run).await?;
        }

        Ok(ExecuteResponse {
            response: run.response,
            signatures: run.signatures,
            logs: String::new(),
        })
    }

    fn network(&self) -> String {
        self.network.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainRpc;
    use crate::signing::{ActionParams, AuthAssertion};

    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const OTHER_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn request(public_key: &str) -> ExecuteRequest {
        ExecuteRequest {
            code: SigningAction::sign_transaction().to_code().unwrap(),
            auth_sig: AuthAssertion {
                sig: "0x00".into(),
                derived_via: "web3.eth.personal.sign".into(),
                signed_message: "sign in".into(),
                address: "0x0000000000000000000000000000000000000000".into(),
            },
            js_params: ActionParams {
                public_key: public_key.to_string(),
                chain: "mumbai".into(),
                sig_name: "sig1".into(),
                chain_id: 80001,
                to: "0xb1b3d3930eC3A721Db287D21c1ff0541C2Fc5849".parse().unwrap(),
                value: "0x".into(),
                data: Bytes::from(vec![0xaa]),
                gas_price: "0x2e90edd000".into(),
                gas_limit: "0xa410".into(),
            },
        }
    }

    #[tokio::test]
    async fn test_execute_signs_with_fresh_nonce() {
        let mut rpc = MockChainRpc::new();
        rpc.expect_transaction_count().times(1).returning(|_| Ok(12));
        let service = LocalSigningService::from_hex(ANVIL_KEY, Arc::new(rpc)).unwrap();
        service.connect().await.unwrap();

        let result = service.execute(request(service.public_key())).await.unwrap();
        let fields = UnsignedFields::from_response(&result.response).unwrap();
        assert_eq!(fields.nonce, U256::from(12));
        assert_eq!(fields.gas_limit, U256::from(42_000));

        let signature = result.signatures["sig1"].to_signature().unwrap();
        assert_eq!(
            signature.recover(fields.signing_hash()).unwrap(),
            service.address()
        );
    }

    #[tokio::test]
    async fn test_not_connected() {
        let service = LocalSigningService::from_hex(ANVIL_KEY, Arc::new(MockChainRpc::new())).unwrap();
        let err = service.execute(request(service.public_key())).await.unwrap_err();
        assert!(matches!(err, ClaimError::SigningServiceNotReady));
    }

    #[tokio::test]
    async fn test_foreign_key_is_refused() {
        let other = LocalSigningService::from_hex(OTHER_KEY, Arc::new(MockChainRpc::new())).unwrap();

        let mut rpc = MockChainRpc::new();
        rpc.expect_transaction_count().returning(|_| Ok(0));
        let service = LocalSigningService::from_hex(ANVIL_KEY, Arc::new(rpc)).unwrap();
        service.connect().await.unwrap();

        let err = service.execute(request(other.public_key())).await.unwrap_err();
        assert!(matches!(err, ClaimError::SigningExecutionFailed(_)));
    }

    #[tokio::test]
    async fn test_steps_out_of_order() {
        let service = LocalSigningService::from_hex(ANVIL_KEY, Arc::new(MockChainRpc::new())).unwrap();
        service.connect().await.unwrap();

        let mut req = request(service.public_key());
        req.code = serde_json::to_string(&SigningAction {
            name: "broken".into(),
            steps: vec![ActionStep::SignEcdsa],
        })
        .unwrap();

        let err = service.execute(req).await.unwrap_err();
        assert!(matches!(err, ClaimError::SigningExecutionFailed(_)));
    }
}
