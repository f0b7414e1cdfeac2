//! Configuration management for the airdrop claim service
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use ethers::types::Address;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::signing::AuthAssertion;
use crate::tx::{DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub metrics: MetricsConfig,
    pub claim: ClaimConfig,
    pub rpc: RpcConfig,
    pub signing: SigningConfig,
    #[serde(default)]
    pub auth: Option<AuthAssertion>,
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub pages: PagesConfig,
    #[serde(default)]
    pub chains: HashMap<String, ChainOverride>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Sessions unused for this long are dropped
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaimConfig {
    /// Chain name as known to the signing network (e.g. "mumbai")
    pub chain: String,
    pub contract_address: String,
    pub signing_public_key: String,
    #[serde(default = "default_gas_price")]
    pub gas_price: String,
    #[serde(default = "default_gas_limit")]
    pub fallback_gas_limit: String,
    #[serde(default = "default_gas_multiplier")]
    pub gas_multiplier: u64,
    #[serde(default = "default_signature_name")]
    pub signature_name: String,
    #[serde(default)]
    pub drop_id: u64,
    #[serde(default)]
    pub quantity: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SigningMode {
    Gateway,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SigningConfig {
    pub mode: SigningMode,
    pub network: String,
    #[serde(default)]
    pub gateway_url: Option<String>,
    /// Unset means the execute call waits as long as the network does
    #[serde(default)]
    pub execute_timeout_ms: Option<u64>,
    #[serde(default = "default_local_key_env")]
    pub local_private_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    pub catalog: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PagesConfig {
    pub explainer_url: String,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            explainer_url: "https://www.canva.com/design/DAFZ_eLoFgo/ICO3g2xu8Ssr_0Bv0Z38wQ/view"
                .to_string(),
        }
    }
}

/// Extra or replacement entries for the built-in chain registry
#[derive(Debug, Clone, Deserialize)]
pub struct ChainOverride {
    pub chain_id: u64,
    pub explorer_host: String,
}

fn default_gas_price() -> String {
    DEFAULT_GAS_PRICE.to_string()
}

fn default_gas_limit() -> String {
    DEFAULT_GAS_LIMIT.to_string()
}

fn default_gas_multiplier() -> u64 {
    2
}

fn default_signature_name() -> String {
    "sig1".to_string()
}

fn default_local_key_env() -> String {
    "LOCAL_SIGNER_KEY".to_string()
}

fn default_fetch_timeout_ms() -> u64 {
    5000
}

fn default_session_ttl_secs() -> u64 {
    1800
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("AIRDROP_CLAIM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::from_path(&config_path)
    }

    /// Load settings from an explicit file
    pub fn from_path(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_str)
    }

    /// Parse settings from TOML text
    pub fn from_toml(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.metadata.catalog.is_empty() {
            anyhow::bail!("Metadata catalog must contain at least one URI");
        }

        self.claim
            .contract_address
            .parse::<Address>()
            .with_context(|| format!("Invalid contract address: {}", self.claim.contract_address))?;

        if self.server.session_ttl_secs == 0 {
            anyhow::bail!("Session TTL must be at least one second");
        }

        if self.claim.gas_multiplier == 0 {
            anyhow::bail!("Gas multiplier must be at least 1");
        }

        if self.signing.mode == SigningMode::Gateway
            && self.signing.gateway_url.as_deref().unwrap_or("").is_empty()
        {
            anyhow::bail!("Signing mode 'gateway' requires signing.gateway_url");
        }

        if self.claim.signing_public_key.is_empty() {
            tracing::warn!("No signing public key configured - every mint will fail");
        }

        Ok(())
    }

    pub fn contract_address(&self) -> Address {
        // validate() has already parsed this
        self.claim.contract_address.parse().unwrap_or_default()
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata.fetch_timeout_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.server.session_ttl_secs)
    }

    pub fn execute_timeout(&self) -> Option<Duration> {
        self.signing.execute_timeout_ms.map(Duration::from_millis)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = match regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") {
        Ok(re) => re,
        Err(_) => return result,
    };

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) const SAMPLE: &str = r#"
[server]
host = "127.0.0.1"
port = 3000

[metrics]
enabled = false
port = 9090

[claim]
chain = "mumbai"
contract_address = "0xb1b3d3930eC3A721Db287D21c1ff0541C2Fc5849"
signing_public_key = "0x04cbacd8249dd6ee4428e5d8bd9153c4306d140e1488a6f44ccbed03e924716ac8078ee08fd06b948fa9a2addd17ffc7108852562333c2374944b55423f1f5645c"

[rpc]
url = "http://localhost:8545"

[signing]
mode = "gateway"
network = "serrano"
gateway_url = "http://localhost:7470"

[metadata]
catalog = ["https://meta.test/0.json", "https://meta.test/1.json"]
"#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("CLAIM_TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${CLAIM_TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_defaults_applied() {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        assert_eq!(settings.claim.gas_price, "0x2e90edd000");
        assert_eq!(settings.claim.fallback_gas_limit, "0x7530");
        assert_eq!(settings.claim.gas_multiplier, 2);
        assert_eq!(settings.claim.signature_name, "sig1");
        assert_eq!(settings.metadata_timeout(), Duration::from_millis(5000));
        assert!(settings.execute_timeout().is_none());
        assert_eq!(settings.session_ttl(), Duration::from_secs(1800));
        assert!(settings.auth.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let settings = Settings::from_path(file.path()).unwrap();
        assert_eq!(settings.claim.chain, "mumbai");
        assert_eq!(settings.metadata.catalog.len(), 2);
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let config = SAMPLE.replace(
            r#"catalog = ["https://meta.test/0.json", "https://meta.test/1.json"]"#,
            "catalog = []",
        );
        assert!(Settings::from_toml(&config).is_err());
    }

    #[test]
    fn test_shipped_config_loads() {
        env::set_var("SIGNING_GATEWAY_URL", "http://localhost:7470");
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");

        let settings = Settings::from_path(&path).unwrap();
        assert_eq!(settings.metadata.catalog.len(), 11);
        assert_eq!(settings.signing.gateway_url.as_deref(), Some("http://localhost:7470"));
        let auth = settings.auth.unwrap();
        assert_eq!(auth.derived_via, "web3.eth.personal.sign");
        assert!(auth.signed_message.contains("Chain ID: 80001"));
    }

    #[test]
    fn test_gateway_mode_requires_url() {
        let config = SAMPLE.replace("gateway_url = \"http://localhost:7470\"", "");
        assert!(Settings::from_toml(&config).is_err());
    }
}
