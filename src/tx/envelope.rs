//! Unsigned transaction fields and the signed legacy envelope

use crate::error::{ClaimError, ClaimResult};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Signature, TransactionRequest, H256, U256};
use ethers::utils::keccak256;
use serde::{Deserialize, Deserializer, Serialize};

/// Fields the signing action declares as its response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedFields {
    #[serde(deserialize_with = "quantity")]
    pub nonce: U256,
    #[serde(deserialize_with = "quantity")]
    pub gas_price: U256,
    #[serde(deserialize_with = "quantity")]
    pub gas_limit: U256,
    pub to: Address,
    #[serde(deserialize_with = "quantity")]
    pub value: U256,
    #[serde(deserialize_with = "quantity_u64")]
    pub chain_id: u64,
    #[serde(default)]
    pub data: Bytes,
}

impl UnsignedFields {
    /// Read the declared response; accepts an object or a JSON-encoded string
    pub fn from_response(response: &serde_json::Value) -> ClaimResult<Self> {
        let parsed = match response {
            serde_json::Value::String(text) => serde_json::from_str(text),
            other => serde_json::from_value(other.clone()),
        };

        parsed.map_err(|e| {
            ClaimError::SigningExecutionFailed(format!("Response is not a transaction: {}", e))
        })
    }

    pub fn to_typed_transaction(&self) -> TypedTransaction {
        let request = TransactionRequest::new()
            .nonce(self.nonce)
            .gas_price(self.gas_price)
            .gas(self.gas_limit)
            .to(self.to)
            .value(self.value)
            .data(self.data.clone())
            .chain_id(self.chain_id);

        TypedTransaction::Legacy(request)
    }

    /// EIP-155 signing payload
    pub fn serialize_unsigned(&self) -> Bytes {
        self.to_typed_transaction().rlp()
    }

    /// keccak-256 of the serialized unsigned transaction
    pub fn signing_hash(&self) -> H256 {
        H256::from(keccak256(self.serialize_unsigned()))
    }

    /// Serialized signed transaction ready for broadcast
    pub fn encode_signed(&self, signature: &Signature) -> ClaimResult<Bytes> {
        let signature = to_eip155(signature, self.chain_id)?;
        Ok(self.to_typed_transaction().rlp_signed(&signature))
    }
}

/// Rewrite a 27/28 (or 0/1) recovery id into an EIP-155 `v`
pub fn to_eip155(signature: &Signature, chain_id: u64) -> ClaimResult<Signature> {
    let recovery = match signature.v {
        0 | 1 => signature.v,
        27 | 28 => signature.v - 27,
        v if v >= 35 => {
            if (v - 35) / 2 != chain_id {
                return Err(ClaimError::SigningExecutionFailed(format!(
                    "Signature is for chain {}, expected {}",
                    (v - 35) / 2,
                    chain_id
                )));
            }
            return Ok(Signature {
                r: signature.r,
                s: signature.s,
                v,
            });
        }
        v => {
            return Err(ClaimError::SigningExecutionFailed(format!(
                "Invalid recovery id {}",
                v
            )))
        }
    };

    let v = chain_id
        .checked_mul(2)
        .and_then(|v| v.checked_add(35 + recovery))
        .ok_or_else(|| {
            ClaimError::SigningExecutionFailed(format!("Chain id {} does not fit in v", chain_id))
        })?;

    Ok(Signature {
        r: signature.r,
        s: signature.s,
        v,
    })
}

/// Parse a quantity given as decimal or 0x-hex text ("0x" is zero)
pub fn parse_quantity(text: &str) -> ClaimResult<U256> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some("") => Ok(U256::zero()),
        Some(digits) => U256::from_str_radix(digits, 16)
            .map_err(|e| ClaimError::Encoding(format!("Bad hex quantity {}: {:?}", text, e))),
        None if text.is_empty() => Ok(U256::zero()),
        None => U256::from_dec_str(text)
            .map_err(|e| ClaimError::Encoding(format!("Bad quantity {}: {:?}", text, e))),
    }
}

fn quantity_from_json(value: &serde_json::Value) -> Result<U256, String> {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| format!("quantity {} is not an unsigned integer", n)),
        serde_json::Value::String(s) => parse_quantity(s).map_err(|e| e.to_string()),
        serde_json::Value::Null => Ok(U256::zero()),
        other => Err(format!("unexpected quantity {}", other)),
    }
}

fn quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    quantity_from_json(&value).map_err(serde::de::Error::custom)
}

fn quantity_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = quantity(deserializer)?;
    if value > U256::from(u64::MAX) {
        return Err(serde::de::Error::custom("chain id out of range"));
    }
    Ok(value.as_u64())
}
