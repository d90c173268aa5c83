//! Types for token issuance runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::collaborators::format_amount;
use crate::config::MetadataConfig;

/// Longest accepted token symbol, in characters.
pub const MAX_SYMBOL_LEN: usize = 6;

const MAX_MEMO_LEN: usize = 30;

/// Errors that end an issuance run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IssuanceError {
    /// Bad form input, caught before any external call.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Wallet unavailable or rejected the connection.
    #[error("wallet connection failed: {0}")]
    Connection(String),

    /// Metadata could not be pinned or was never confirmed.
    #[error("metadata publication failed: {0}")]
    Publish(String),

    /// Building, proving or submitting the deployment failed.
    #[error("deployment failed: {0}")]
    Deploy(String),

    /// Deployment transaction rejected or never included.
    #[error("deployment not confirmed: {0}")]
    ChainConfirmation(String),

    /// Contract state never matched the expected linkage.
    #[error("contract state verification failed: {0}")]
    StateVerification(String),

    /// A mint entry failed. `index` is the first failing entry.
    #[error("mint {index} failed: {reason}")]
    Mint { index: usize, reason: String },

    #[error("Cancelled")]
    Cancelled,

    /// Another run holds the issuer.
    #[error("an issuance run is already in progress")]
    AlreadyRunning,
}

impl IssuanceError {
    /// Stage label used in metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            IssuanceError::Validation(_) => "validation",
            IssuanceError::Connection(_) => "wallet",
            IssuanceError::Publish(_) => "metadata",
            IssuanceError::Deploy(_) => "deploy",
            IssuanceError::ChainConfirmation(_) => "deploy_confirm",
            IssuanceError::StateVerification(_) => "verify_state",
            IssuanceError::Mint { .. } => "mint",
            IssuanceError::Cancelled => "cancelled",
            IssuanceError::AlreadyRunning => "guard",
        }
    }
}

/// One row of the mint form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub to: String,
}

impl MintRequest {
    pub fn new(amount: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            to: to.into(),
        }
    }

    /// Both fields blank. Such rows are dropped silently.
    pub fn is_empty(&self) -> bool {
        self.amount.trim().is_empty() && self.to.trim().is_empty()
    }
}

/// A mint row that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedMint {
    /// Position among the non-empty rows; becomes the `mint-<index>` id.
    pub index: usize,
    pub amount: u64,
    pub to: String,
}

impl VerifiedMint {
    pub fn display_amount(&self) -> String {
        format_amount(self.amount)
    }
}

/// Form inputs for one issuance run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRequest {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub telegram: String,
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub discord: String,
    #[serde(default)]
    pub mint: Vec<MintRequest>,
}

impl IssueRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    pub fn with_mint(mut self, amount: impl Into<String>, to: impl Into<String>) -> Self {
        self.mint.push(MintRequest::new(amount, to));
        self
    }

    /// Trimmed symbol, if it has an acceptable length.
    pub fn checked_symbol(&self) -> Option<&str> {
        let symbol = self.symbol.trim();
        let len = symbol.chars().count();
        (1..=MAX_SYMBOL_LEN).contains(&len).then_some(symbol)
    }
}

/// Metadata record pinned to permanent storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub symbol: String,
    pub name: String,
    pub description: String,
    pub image: String,
    pub website: String,
    pub telegram: String,
    pub twitter: String,
    pub discord: String,
    pub token_contract_code: String,
    pub admin_contracts_code: Vec<String>,
}

impl TokenMetadata {
    pub fn new(request: &IssueRequest, contracts: &MetadataConfig) -> Self {
        Self {
            symbol: request.symbol.trim().to_string(),
            name: request.name.trim().to_string(),
            description: request.description.trim().to_string(),
            image: request.image.trim().to_string(),
            website: request.website.trim().to_string(),
            telegram: request.telegram.trim().to_string(),
            twitter: request.twitter.trim().to_string(),
            discord: request.discord.trim().to_string(),
            token_contract_code: contracts.token_contract_code.clone(),
            admin_contracts_code: contracts.admin_contracts_code.clone(),
        }
    }
}

/// Memo attached to a mint transaction.
pub fn mint_memo(amount: u64, symbol: &str) -> String {
    let memo = format!("mint {} {}", format_amount(amount), symbol);
    if memo.chars().count() > MAX_MEMO_LEN {
        format!("mint {}", symbol).chars().take(MAX_MEMO_LEN).collect()
    } else {
        memo
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Idle,
    Validating,
    ConnectingWallet,
    PublishingMetadata,
    Deploying,
    ConfirmingDeploy,
    VerifyingState,
    Minting,
    Done,
    Error,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Validating => "validating",
            RunPhase::ConnectingWallet => "connecting_wallet",
            RunPhase::PublishingMetadata => "publishing_metadata",
            RunPhase::Deploying => "deploying",
            RunPhase::ConfirmingDeploy => "confirming_deploy",
            RunPhase::VerifyingState => "verifying_state",
            RunPhase::Minting => "minting",
            RunPhase::Done => "done",
            RunPhase::Error => "error",
        }
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    /// Every stage succeeded.
    pub issued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_contract_address: Option<String>,
    /// Mint entries confirmed on chain.
    pub minted: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Snapshot of the issuer for status endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssuerStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub phase: RunPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<RunReport>,
}

/// A run started in the background.
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: String,
    join: JoinHandle<RunReport>,
}

impl RunHandle {
    pub(crate) fn new(run_id: String, join: JoinHandle<RunReport>) -> Self {
        Self { run_id, join }
    }

    /// Drop the run task without waiting for it. Prefer cancelling through
    /// the issuer, which records the outcome.
    pub fn abort(&self) {
        self.join.abort();
    }

    /// Wait for the run to finish. `None` if the task was aborted or panicked.
    pub async fn join(self) -> Option<RunReport> {
        self.join.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_symbol() {
        assert_eq!(IssueRequest::new(" TEST ").checked_symbol(), Some("TEST"));
        assert_eq!(IssueRequest::new("ABCDEF").checked_symbol(), Some("ABCDEF"));
        assert_eq!(IssueRequest::new("ABCDEFG").checked_symbol(), None);
        assert_eq!(IssueRequest::new("   ").checked_symbol(), None);
    }

    #[test]
    fn test_mint_request_is_empty() {
        assert!(MintRequest::new("", "  ").is_empty());
        assert!(!MintRequest::new("5", "").is_empty());
        assert!(!MintRequest::new("", "B62").is_empty());
    }

    #[test]
    fn test_mint_memo() {
        assert_eq!(mint_memo(1_000_000_000_000, "TEST"), "mint 1000 TEST");
        assert_eq!(mint_memo(1_500_000_000, "ABC"), "mint 1.5 ABC");

        // 18446744073.709551615 does not fit next to the symbol
        let memo = mint_memo(u64::MAX, "TOKEN");
        assert_eq!(memo, "mint TOKEN");
    }

    #[test]
    fn test_metadata_serializes_camel_case() {
        let request = IssueRequest {
            name: "Test Token".to_string(),
            website: "https://example.com".to_string(),
            ..IssueRequest::new("TEST")
        };
        let metadata = TokenMetadata::new(&request, &MetadataConfig::default());
        let json = serde_json::to_value(&metadata).unwrap();

        assert_eq!(json["symbol"], "TEST");
        assert_eq!(json["name"], "Test Token");
        assert_eq!(json["website"], "https://example.com");
        assert!(json["tokenContractCode"].as_str().unwrap().ends_with("FungibleToken.ts"));
        assert_eq!(json["adminContractsCode"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_issue_request_deserialize_defaults() {
        let json = r#"{"symbol":"TEST","mint":[{"amount":"10","to":"B62x"},{}]}"#;
        let request: IssueRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.symbol, "TEST");
        assert!(request.name.is_empty());
        assert_eq!(request.mint.len(), 2);
        assert!(request.mint[1].is_empty());
    }

    #[test]
    fn test_error_display_and_stage() {
        let err = IssuanceError::Mint {
            index: 2,
            reason: "rejected".to_string(),
        };
        assert_eq!(err.to_string(), "mint 2 failed: rejected");
        assert_eq!(err.stage(), "mint");
        assert_eq!(IssuanceError::Cancelled.to_string(), "Cancelled");
    }

    #[test]
    fn test_issuer_status_default() {
        let status = IssuerStatus::default();
        assert!(!status.running);
        assert_eq!(status.phase, RunPhase::Idle);
        assert!(status.last_run.is_none());
    }
}
