//! Transaction request owned by a single mint attempt

use crate::error::{ClaimError, ClaimResult};

use ethers::types::{Address, Bytes};

/// Gas price used when the caller supplies none (200 gwei)
pub const DEFAULT_GAS_PRICE: &str = "0x2e90edd000";

/// Gas limit used when the caller supplies none (30000)
pub const DEFAULT_GAS_LIMIT: &str = "0x7530";

/// What the caller wants signed and broadcast
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxRequest {
    /// Chain name, resolved through the chain registry
    pub chain: String,
    pub signing_public_key: String,
    pub recipient: Option<Address>,
    /// Hex quantity; "0x" means zero
    pub value: String,
    pub payload: Option<Bytes>,
    pub gas_price: Option<String>,
    pub gas_limit: Option<String>,
}

impl TxRequest {
    pub fn new(chain: &str, signing_public_key: &str) -> Self {
        Self {
            chain: chain.to_string(),
            signing_public_key: signing_public_key.to_string(),
            value: "0x".to_string(),
            ..Default::default()
        }
    }

    pub fn to(mut self, recipient: Address) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn data(mut self, payload: Bytes) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn gas_price(mut self, gas_price: &str) -> Self {
        self.gas_price = Some(gas_price.to_string());
        self
    }

    pub fn gas_limit(mut self, gas_limit: &str) -> Self {
        self.gas_limit = Some(gas_limit.to_string());
        self
    }

    pub fn recipient(&self) -> ClaimResult<Address> {
        self.recipient.ok_or(ClaimError::MissingField("recipient"))
    }

    pub fn payload(&self) -> ClaimResult<&Bytes> {
        self.payload.as_ref().ok_or(ClaimError::MissingField("payload"))
    }

    pub fn gas_price_or_default(&self) -> String {
        self.gas_price
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_GAS_PRICE.to_string())
    }

    pub fn gas_limit_or_default(&self) -> String {
        self.gas_limit
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_GAS_LIMIT.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_fallbacks() {
        let request = TxRequest::new("mumbai", "0x04");
        assert_eq!(request.gas_price_or_default(), "0x2e90edd000");
        assert_eq!(request.gas_limit_or_default(), "0x7530");

        let request = request.gas_limit("0xa410").gas_price("0x1");
        assert_eq!(request.gas_limit_or_default(), "0xa410");
        assert_eq!(request.gas_price_or_default(), "0x1");
    }

    #[test]
    fn test_missing_fields() {
        let request = TxRequest::new("mumbai", "0x04");
        assert!(matches!(request.recipient(), Err(ClaimError::MissingField("recipient"))));
        assert!(matches!(request.payload(), Err(ClaimError::MissingField("payload"))));
        assert_eq!(request.value, "0x");
    }
}
