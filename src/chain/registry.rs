//! Static chain registry: chain name -> chain id and block explorer

use crate::config::ChainOverride;
use crate::error::{ClaimError, ClaimResult};

use ethers::types::TxHash;
use std::collections::HashMap;
use tracing::debug;

/// A chain the signing network knows by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainInfo {
    pub name: String,
    pub chain_id: u64,
    pub explorer_host: String,
}

impl ChainInfo {
    pub fn new(name: &str, chain_id: u64, explorer_host: &str) -> Self {
        Self {
            name: name.to_string(),
            chain_id,
            explorer_host: explorer_host.to_string(),
        }
    }

    /// Block explorer page for a broadcast transaction
    pub fn explorer_tx_url(&self, hash: &TxHash) -> String {
        format!("https://{}/tx/{:?}", self.explorer_host, hash)
    }
}

const BUILTIN_CHAINS: &[(&str, u64, &str)] = &[
    ("ethereum", 1, "etherscan.io"),
    ("polygon", 137, "polygonscan.com"),
    ("mumbai", 80001, "mumbai.polygonscan.com"),
    ("goerli", 5, "goerli.etherscan.io"),
    ("sepolia", 11155111, "sepolia.etherscan.io"),
    ("optimism", 10, "optimistic.etherscan.io"),
    ("arbitrum", 42161, "arbiscan.io"),
    ("bsc", 56, "bscscan.com"),
    ("avalanche", 43114, "snowtrace.io"),
    ("fantom", 250, "ftmscan.com"),
    ("xdai", 100, "gnosisscan.io"),
];

/// Immutable lookup table, built once at startup
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: HashMap<String, ChainInfo>,
}

impl ChainRegistry {
    /// Registry with the chains the signing network ships with
    pub fn builtin() -> Self {
        let chains = BUILTIN_CHAINS
            .iter()
            .map(|(name, id, host)| (name.to_string(), ChainInfo::new(name, *id, host)))
            .collect();
        Self { chains }
    }

    /// Apply configured additions or replacements
    pub fn with_overrides(mut self, overrides: &HashMap<String, ChainOverride>) -> Self {
        for (name, chain) in overrides {
            debug!("Registering chain {} (ID: {})", name, chain.chain_id);
            self.chains.insert(
                name.clone(),
                ChainInfo::new(name, chain.chain_id, &chain.explorer_host),
            );
        }
        self
    }

    /// Resolve a chain by name
    pub fn resolve(&self, name: &str) -> ClaimResult<&ChainInfo> {
        self.chains
            .get(name)
            .filter(|c| c.chain_id != 0)
            .ok_or_else(|| ClaimError::UnknownChain {
                chain: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
