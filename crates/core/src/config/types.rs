use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::issuance::IssuanceConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub chain: ChainConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub issuance: IssuanceConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Target network. Selects both the wallet network check and the explorer path.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChainNetwork {
    Devnet,
    Mainnet,
}

impl ChainNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainNetwork::Devnet => "devnet",
            ChainNetwork::Mainnet => "mainnet",
        }
    }
}

impl std::fmt::Display for ChainNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chain selection and block explorer
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
    pub network: ChainNetwork,
    /// Explorer base URL (e.g., "https://minascan.io")
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,
}

fn default_explorer_url() -> String {
    "https://minascan.io".to_string()
}

impl ChainConfig {
    pub fn new(network: ChainNetwork) -> Self {
        Self {
            network,
            explorer_url: default_explorer_url(),
        }
    }

    fn base(&self) -> String {
        format!(
            "{}/{}",
            self.explorer_url.trim_end_matches('/'),
            self.network.as_str()
        )
    }

    /// Explorer page for a transaction.
    pub fn tx_url(&self, hash: &str) -> String {
        format!("{}/tx/{}?type=zk-tx", self.base(), hash)
    }

    /// Explorer page for an account.
    pub fn account_url(&self, address: &str) -> String {
        format!("{}/account/{}/txs?type=zk-acc", self.base(), address)
    }
}

/// JSON bridge that fronts the wallet, chain, proving and pinning services
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Bridge base URL (e.g., "http://localhost:3001")
    #[serde(default = "default_gateway_url")]
    pub url: String,
    /// Bearer token sent with every request
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_gateway_url() -> String {
    "http://127.0.0.1:3001".to_string()
}

fn default_timeout() -> u32 {
    30
}

/// Contract source references written into every metadata record
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataConfig {
    #[serde(default = "default_token_contract_code")]
    pub token_contract_code: String,
    #[serde(default = "default_admin_contracts_code")]
    pub admin_contracts_code: Vec<String>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            token_contract_code: default_token_contract_code(),
            admin_contracts_code: default_admin_contracts_code(),
        }
    }
}

fn default_token_contract_code() -> String {
    "https://github.com/MinaFoundation/mina-fungible-token/blob/main/FungibleToken.ts".to_string()
}

fn default_admin_contracts_code() -> Vec<String> {
    vec![
        "https://github.com/MinaFoundation/mina-fungible-token/blob/main/FungibleTokenAdmin.ts"
            .to_string(),
    ]
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub chain: ChainConfig,
    pub server: ServerConfig,
    pub gateway: SanitizedGatewayConfig,
    pub issuance: IssuanceConfig,
    pub metadata: MetadataConfig,
}

/// Sanitized gateway config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedGatewayConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            chain: config.chain.clone(),
            server: config.server.clone(),
            gateway: SanitizedGatewayConfig {
                url: config.gateway.url.clone(),
                api_key_configured: config
                    .gateway
                    .api_key
                    .as_deref()
                    .is_some_and(|k| !k.is_empty()),
                timeout_secs: config.gateway.timeout_secs,
            },
            issuance: config.issuance.clone(),
            metadata: config.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[chain]
network = "devnet"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.chain.network, ChainNetwork::Devnet);
        assert_eq!(config.chain.explorer_url, "https://minascan.io");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.gateway.timeout_secs, 30);
        assert!(config.gateway.api_key.is_none());
        assert!(!config.issuance.cloud_proving);
        assert_eq!(config.metadata.admin_contracts_code.len(), 1);
    }

    #[test]
    fn test_deserialize_missing_chain_fails() {
        let toml = r#"
[server]
port = 8080
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_full_gateway() {
        let toml = r#"
[chain]
network = "mainnet"
explorer_url = "https://explorer.example"

[gateway]
url = "http://bridge:3001"
api_key = "jwt-token"
timeout_secs = 90
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.chain.network, ChainNetwork::Mainnet);
        assert_eq!(config.gateway.url, "http://bridge:3001");
        assert_eq!(config.gateway.api_key.as_deref(), Some("jwt-token"));
        assert_eq!(config.gateway.timeout_secs, 90);
    }

    #[test]
    fn test_explorer_links() {
        let chain = ChainConfig::new(ChainNetwork::Devnet);
        assert_eq!(
            chain.tx_url("5Jabc"),
            "https://minascan.io/devnet/tx/5Jabc?type=zk-tx"
        );
        assert_eq!(
            chain.account_url("B62xyz"),
            "https://minascan.io/devnet/account/B62xyz/txs?type=zk-acc"
        );
    }

    #[test]
    fn test_explorer_links_trailing_slash() {
        let chain = ChainConfig {
            network: ChainNetwork::Mainnet,
            explorer_url: "https://minascan.io/".to_string(),
        };
        assert_eq!(
            chain.tx_url("h"),
            "https://minascan.io/mainnet/tx/h?type=zk-tx"
        );
    }

    #[test]
    fn test_sanitized_config_hides_api_key() {
        let config = Config {
            chain: ChainConfig::new(ChainNetwork::Devnet),
            server: ServerConfig::default(),
            gateway: GatewayConfig {
                api_key: Some("secret".to_string()),
                ..GatewayConfig::default()
            },
            issuance: IssuanceConfig::default(),
            metadata: MetadataConfig::default(),
        };

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.gateway.api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("devnet"));
    }
}
