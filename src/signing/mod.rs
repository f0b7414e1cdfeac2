//! Threshold signing service - the external network that holds the key
//!
//! The claim workflow never sees private key material. It sends a signing
//! action plus parameters and an auth assertion, and gets back the declared
//! response payload and named signatures.

mod action;
mod auth;
mod gateway;
mod keys;
mod local;

pub use action::{ActionStep, SigningAction};
pub use auth::{AuthProvider, ConfiguredAuth};
pub use gateway::GatewaySigningClient;
pub use keys::public_key_to_address;
pub use local::LocalSigningService;

#[cfg(test)]
pub use auth::MockAuthProvider;

use crate::error::{ClaimError, ClaimResult};

use async_trait::async_trait;
use ethers::types::{Address, Bytes, Signature, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Proof of wallet ownership presented to the signing network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthAssertion {
    pub sig: String,
    #[serde(alias = "derived_via")]
    pub derived_via: String,
    #[serde(alias = "signed_message")]
    pub signed_message: String,
    pub address: String,
}

/// Parameters the signing action reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionParams {
    pub public_key: String,
    pub chain: String,
    pub sig_name: String,
    pub chain_id: u64,
    pub to: Address,
    pub value: String,
    pub data: Bytes,
    pub gas_price: String,
    pub gas_limit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    /// Serialized [`SigningAction`]
    pub code: String,
    pub auth_sig: AuthAssertion,
    pub js_params: ActionParams,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteResponse {
    /// Payload declared by the action (the unsigned transaction fields)
    #[serde(default)]
    pub response: serde_json::Value,
    #[serde(default)]
    pub signatures: HashMap<String, SignatureShare>,
    #[serde(default)]
    pub logs: String,
}

/// One combined signature as returned by the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureShare {
    /// 65-byte r || s || v, hex encoded
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub r: String,
    #[serde(default)]
    pub s: String,
    #[serde(default)]
    pub recid: u8,
    #[serde(default)]
    pub public_key: String,
}

impl SignatureShare {
    pub fn from_signature(signature: &Signature, public_key: &str) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        signature.r.to_big_endian(&mut r);
        signature.s.to_big_endian(&mut s);

        Self {
            signature: format!("0x{}", hex::encode(signature.to_vec())),
            r: hex::encode(r),
            s: hex::encode(s),
            recid: signature.v.saturating_sub(27) as u8,
            public_key: public_key.to_string(),
        }
    }

    /// Decode into an ethers signature, preferring the packed form
    pub fn to_signature(&self) -> ClaimResult<Signature> {
        if !self.signature.is_empty() {
            return Signature::from_str(&self.signature).map_err(|e| {
                ClaimError::SigningExecutionFailed(format!("Malformed signature: {}", e))
            });
        }

        let parse = |part: &str| {
            U256::from_str_radix(part.trim_start_matches("0x"), 16).map_err(|e| {
                ClaimError::SigningExecutionFailed(format!("Malformed signature part: {}", e))
            })
        };

        Ok(Signature {
            r: parse(&self.r)?,
            s: parse(&self.s)?,
            v: u64::from(self.recid) + 27,
        })
    }
}

/// Operations the claim workflow needs from the signing network
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SigningService: Send + Sync {
    /// Connect to the network; idempotent
    async fn connect(&self) -> ClaimResult<()>;

    /// True once connect() has completed
    fn is_ready(&self) -> bool;

    /// Run a signing action
    async fn execute(&self, request: ExecuteRequest) -> ClaimResult<ExecuteResponse>;

    /// Network name, for logs
    fn network(&self) -> String;
}
