//! Mock token builder for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::collaborators::{
    CollaboratorError, DeployRequest, DeploymentKeys, MintTransactionRequest, SignedTransaction,
    TokenBuilder, UnsignedTransaction,
};

use super::fixtures;

/// Mock implementation of the TokenBuilder trait.
///
/// Records every build request. Transactions are plain strings:
/// `deploy:<symbol>`, `mint:<nonce>:<to>`, and `signed:<tx>` once proved.
#[derive(Debug, Default)]
pub struct MockBuilder {
    deploy_requests: RwLock<Vec<DeployRequest>>,
    mint_requests: RwLock<Vec<MintTransactionRequest>>,
    proved: RwLock<Vec<UnsignedTransaction>>,
    failing_mints: RwLock<HashMap<usize, String>>,
    next_error: RwLock<Option<CollaboratorError>>,
}

impl MockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: CollaboratorError) {
        *self.next_error.write().await = Some(error);
    }

    /// Fail building the mint with this fan-out sequence number.
    pub async fn fail_mint(&self, sequence: usize, reason: impl Into<String>) {
        self.failing_mints
            .write()
            .await
            .insert(sequence, reason.into());
    }

    pub async fn deploy_requests(&self) -> Vec<DeployRequest> {
        self.deploy_requests.read().await.clone()
    }

    pub async fn mint_requests(&self) -> Vec<MintTransactionRequest> {
        self.mint_requests.read().await.clone()
    }

    pub async fn proved(&self) -> Vec<UnsignedTransaction> {
        self.proved.read().await.clone()
    }

    async fn take_error(&self) -> Option<CollaboratorError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl TokenBuilder for MockBuilder {
    async fn generate_deploy_keys(&self) -> Result<DeploymentKeys, CollaboratorError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }
        Ok(fixtures::deployment_keys())
    }

    async fn build_deploy(
        &self,
        request: &DeployRequest,
    ) -> Result<UnsignedTransaction, CollaboratorError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }
        self.deploy_requests.write().await.push(request.clone());
        Ok(UnsignedTransaction(format!("deploy:{}", request.symbol)))
    }

    async fn build_mint(
        &self,
        request: &MintTransactionRequest,
    ) -> Result<UnsignedTransaction, CollaboratorError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }
        self.mint_requests.write().await.push(request.clone());
        if let Some(reason) = self.failing_mints.read().await.get(&request.sequence) {
            return Err(CollaboratorError::Internal(reason.clone()));
        }
        Ok(UnsignedTransaction(format!(
            "mint:{}:{}",
            request.nonce, request.to
        )))
    }

    async fn prove(&self, tx: &UnsignedTransaction) -> Result<SignedTransaction, CollaboratorError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }
        self.proved.write().await.push(tx.clone());
        Ok(SignedTransaction(format!("signed:{}", tx.0)))
    }
}
