//! Trait definitions for external collaborators.

use async_trait::async_trait;

use super::error::CollaboratorError;
use super::types::{
    DeployRequest, DeploymentKeys, JobResult, MintTransactionRequest, PinStatus,
    SignedTransaction, TokenAddresses, TxStatus, UnsignedTransaction, WalletConnection,
};

/// Connects to the user's wallet.
#[async_trait]
pub trait WalletConnector: Send + Sync {
    async fn connect(&self) -> Result<WalletConnection, CollaboratorError>;
}

/// Checks a single `(amount, to)` mint entry.
#[async_trait]
pub trait MintValidator: Send + Sync {
    async fn is_valid_mint_entry(&self, amount: &str, to: &str) -> bool;
}

/// Permanent-storage pinning service.
#[async_trait]
pub trait Pinner: Send + Sync {
    /// Pin `content`, returning its content hash (`None` when the service
    /// accepted the call but produced no hash).
    async fn publish(&self, content: &str) -> Result<Option<String>, CollaboratorError>;

    /// Inclusion status of a previously pinned hash.
    async fn status(&self, hash: &str) -> Result<PinStatus, CollaboratorError>;
}

/// Chain transaction submission and status.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Status of a transaction, `None` when the node has no data for it.
    async fn tx_status(&self, hash: &str) -> Result<Option<TxStatus>, CollaboratorError>;

    /// Next nonce for `address`.
    async fn account_nonce(&self, address: &str) -> Result<u64, CollaboratorError>;

    /// Broadcast a signed transaction, returning its hash.
    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<String, CollaboratorError>;
}

/// Cloud proof-generation service.
#[async_trait]
pub trait ProvingService: Send + Sync {
    /// Start a proving job, returning its id.
    async fn submit(&self, tx: &UnsignedTransaction) -> Result<Option<String>, CollaboratorError>;

    /// Result of a job, `None` while it is still running.
    async fn result(&self, job_id: &str) -> Result<Option<JobResult>, CollaboratorError>;
}

/// Builds and locally proves token transactions.
#[async_trait]
pub trait TokenBuilder: Send + Sync {
    /// Fresh key material for the token and admin contracts.
    async fn generate_deploy_keys(&self) -> Result<DeploymentKeys, CollaboratorError>;

    async fn build_deploy(
        &self,
        request: &DeployRequest,
    ) -> Result<UnsignedTransaction, CollaboratorError>;

    async fn build_mint(
        &self,
        request: &MintTransactionRequest,
    ) -> Result<UnsignedTransaction, CollaboratorError>;

    /// Prove and sign in-process.
    async fn prove(&self, tx: &UnsignedTransaction) -> Result<SignedTransaction, CollaboratorError>;
}

/// Reads on-chain contract state.
#[async_trait]
pub trait StateVerifier: Send + Sync {
    /// Whether the deployed contracts are linked as expected.
    async fn verify(&self, addresses: &TokenAddresses) -> Result<bool, CollaboratorError>;
}
