//! Request and response types for external collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reply from a wallet connection attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConnection {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WalletConnection {
    pub fn connected(address: impl Into<String>) -> Self {
        Self {
            success: true,
            address: Some(address.into()),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Inclusion status of pinned content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinStatus {
    pub success: bool,
    /// Number of confirmations, absent until the pin is mined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<u32>,
    /// Public URL of the pinned content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PinStatus {
    /// Mined with at least one confirmation.
    pub fn is_confirmed(&self) -> bool {
        self.success && self.confirmations.is_some_and(|c| c >= 1)
    }
}

/// Chain status of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Applied,
    /// Chain-specific failure kind.
    Failed(String),
}

impl TxStatus {
    /// Parse the node's status string.
    pub fn parse(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "pending" => TxStatus::Pending,
            "applied" | "included" => TxStatus::Applied,
            _ => TxStatus::Failed(status.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Applied => "applied",
            TxStatus::Failed(kind) => kind,
        }
    }
}

/// Outcome of a finished proving job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Completed(SignedTransaction),
    Failed(String),
}

/// Serialized transaction awaiting proof and signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnsignedTransaction(pub String);

/// Serialized transaction ready to broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedTransaction(pub String);

/// Key material for a new token deployment.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentKeys {
    pub token_address: String,
    pub admin_contract_address: String,
    pub token_private_key: String,
    pub admin_contract_private_key: String,
}

impl fmt::Debug for DeploymentKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentKeys")
            .field("token_address", &self.token_address)
            .field("admin_contract_address", &self.admin_contract_address)
            .field("token_private_key", &"<redacted>")
            .field("admin_contract_private_key", &"<redacted>")
            .finish()
    }
}

/// Everything needed to build the deployment transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    pub keys: DeploymentKeys,
    pub admin_address: String,
    pub symbol: String,
    /// URL of the pinned metadata.
    pub uri: String,
}

/// Everything needed to build one mint transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintTransactionRequest {
    pub token_address: String,
    pub admin_contract_address: String,
    pub admin_address: String,
    pub to: String,
    /// Amount in base units.
    pub amount: u64,
    pub nonce: u64,
    pub memo: String,
    /// Position in the fan-out; the builder refreshes account state on 0.
    pub sequence: usize,
}

/// Addresses checked after deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAddresses {
    pub token_contract_address: String,
    pub admin_contract_address: String,
    pub admin_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_status_parse() {
        assert_eq!(TxStatus::parse("pending"), TxStatus::Pending);
        assert_eq!(TxStatus::parse("APPLIED"), TxStatus::Applied);
        assert_eq!(
            TxStatus::parse("Insufficient_balance"),
            TxStatus::Failed("Insufficient_balance".to_string())
        );
        assert_eq!(TxStatus::Failed("rejected".into()).as_str(), "rejected");
    }

    #[test]
    fn test_pin_status_confirmation() {
        let mut status = PinStatus {
            success: true,
            confirmations: None,
            url: None,
        };
        assert!(!status.is_confirmed());

        status.confirmations = Some(0);
        assert!(!status.is_confirmed());

        status.confirmations = Some(1);
        assert!(status.is_confirmed());

        status.success = false;
        assert!(!status.is_confirmed());
    }

    #[test]
    fn test_deployment_keys_debug_redacts_secrets() {
        let keys = DeploymentKeys {
            token_address: "B62token".to_string(),
            admin_contract_address: "B62admin".to_string(),
            token_private_key: "EKEsecret1".to_string(),
            admin_contract_private_key: "EKEsecret2".to_string(),
        };
        let debug = format!("{:?}", keys);
        assert!(debug.contains("B62token"));
        assert!(!debug.contains("EKEsecret"));
    }

    #[test]
    fn test_wallet_connection_deserialize_partial() {
        let json = r#"{"success": false, "error": "User rejected"}"#;
        let conn: WalletConnection = serde_json::from_str(json).unwrap();
        assert!(!conn.success);
        assert!(conn.address.is_none());
        assert_eq!(conn.error.as_deref(), Some("User rejected"));
    }
}
