//! ABI encoding of the airdrop contract's claim function

use crate::error::{ClaimError, ClaimResult};

use ethers::abi::{parse_abi, Abi, Token};
use ethers::types::{Address, Bytes, U256};

const CLAIM_ABI: &str =
    "function claim(uint256 dropId, address receiver, uint256 quantity, bytes32[] proof, string uri)";

/// Arguments of `claim(dropId, receiver, quantity, proof, uri)`
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimCall {
    pub drop_id: U256,
    pub receiver: Address,
    pub quantity: U256,
    pub proof: Vec<[u8; 32]>,
    pub uri: String,
}

impl ClaimCall {
    /// Open claim: no proof, drop and quantity as configured (0 by default)
    pub fn open(drop_id: u64, receiver: Address, quantity: u64, uri: &str) -> Self {
        Self {
            drop_id: U256::from(drop_id),
            receiver,
            quantity: U256::from(quantity),
            proof: Vec::new(),
            uri: uri.to_string(),
        }
    }

    pub fn encode(&self) -> ClaimResult<Bytes> {
        let abi: Abi = parse_abi(&[CLAIM_ABI])
            .map_err(|e| ClaimError::Encoding(format!("claim ABI: {}", e)))?;
        let function = abi
            .function("claim")
            .map_err(|e| ClaimError::Encoding(e.to_string()))?;

        let tokens = [
            Token::Uint(self.drop_id),
            Token::Address(self.receiver),
            Token::Uint(self.quantity),
            Token::Array(
                self.proof
                    .iter()
                    .map(|leaf| Token::FixedBytes(leaf.to_vec()))
                    .collect(),
            ),
            Token::String(self.uri.clone()),
        ];

        function
            .encode_input(&tokens)
            .map(Bytes::from)
            .map_err(|e| ClaimError::Encoding(e.to_string()))
    }
}
