//! Mock chain client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::collaborators::{ChainClient, CollaboratorError, SignedTransaction, TxStatus};

/// Scripted behavior for one sent transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TxScript {
    /// Pending for this many polls, then applied.
    Applied { pending_polls: u32 },
    /// Pending for this many polls, then failed with the kind.
    Failed { pending_polls: u32, kind: String },
}

/// Mock implementation of the ChainClient trait.
///
/// Sent transactions get hashes `5Jtx000001`, `5Jtx000002`, ... in send order.
/// Behavior is scripted per send sequence (0-based): by default every
/// transaction is pending for `pending_polls` polls and then applied.
#[derive(Debug)]
pub struct MockChain {
    nonce: RwLock<u64>,
    nonce_requests: RwLock<Vec<String>>,
    sent: RwLock<Vec<SignedTransaction>>,
    pending_polls: RwLock<u32>,
    pending_forever: RwLock<bool>,
    scripts: RwLock<HashMap<usize, TxScript>>,
    rejected_sends: RwLock<HashMap<usize, String>>,
    status_calls: RwLock<HashMap<String, u32>>,
    next_error: RwLock<Option<CollaboratorError>>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            nonce: RwLock::new(0),
            nonce_requests: RwLock::new(Vec::new()),
            sent: RwLock::new(Vec::new()),
            pending_polls: RwLock::new(0),
            pending_forever: RwLock::new(false),
            scripts: RwLock::new(HashMap::new()),
            rejected_sends: RwLock::new(HashMap::new()),
            status_calls: RwLock::new(HashMap::new()),
            next_error: RwLock::new(None),
        }
    }

    pub fn hash_for(sequence: usize) -> String {
        format!("5Jtx{:06}", sequence + 1)
    }

    pub async fn set_nonce(&self, nonce: u64) {
        *self.nonce.write().await = nonce;
    }

    /// Default pending polls before a transaction is applied.
    pub async fn set_pending_polls(&self, polls: u32) {
        *self.pending_polls.write().await = polls;
    }

    /// Every transaction stays pending.
    pub async fn set_pending_forever(&self, forever: bool) {
        *self.pending_forever.write().await = forever;
    }

    /// Transaction `sequence` is pending for `pending_polls` polls, then applied.
    pub async fn apply_tx_after(&self, sequence: usize, pending_polls: u32) {
        self.scripts
            .write()
            .await
            .insert(sequence, TxScript::Applied { pending_polls });
    }

    /// Transaction `sequence` is pending for `pending_polls` polls, then fails.
    pub async fn fail_tx(&self, sequence: usize, pending_polls: u32, kind: impl Into<String>) {
        self.scripts.write().await.insert(
            sequence,
            TxScript::Failed {
                pending_polls,
                kind: kind.into(),
            },
        );
    }

    /// The `sequence`-th send is rejected.
    pub async fn reject_send(&self, sequence: usize, reason: impl Into<String>) {
        self.rejected_sends
            .write()
            .await
            .insert(sequence, reason.into());
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: CollaboratorError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn sent_transactions(&self) -> Vec<SignedTransaction> {
        self.sent.read().await.clone()
    }

    pub async fn nonce_requests(&self) -> Vec<String> {
        self.nonce_requests.read().await.clone()
    }

    pub async fn status_calls(&self, hash: &str) -> u32 {
        self.status_calls.read().await.get(hash).copied().unwrap_or(0)
    }

    async fn take_error(&self) -> Option<CollaboratorError> {
        self.next_error.write().await.take()
    }

    fn sequence_of(hash: &str) -> Option<usize> {
        hash.strip_prefix("5Jtx")?
            .parse::<usize>()
            .ok()?
            .checked_sub(1)
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn tx_status(&self, hash: &str) -> Result<Option<TxStatus>, CollaboratorError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }

        let polls = {
            let mut calls = self.status_calls.write().await;
            let count = calls.entry(hash.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let Some(sequence) = Self::sequence_of(hash) else {
            return Ok(None);
        };
        if sequence >= self.sent.read().await.len() {
            return Ok(None);
        }
        if *self.pending_forever.read().await {
            return Ok(Some(TxStatus::Pending));
        }

        let default_polls = *self.pending_polls.read().await;
        let script = self
            .scripts
            .read()
            .await
            .get(&sequence)
            .cloned()
            .unwrap_or(TxScript::Applied {
                pending_polls: default_polls,
            });

        let status = match script {
            TxScript::Applied { pending_polls } if polls > pending_polls => TxStatus::Applied,
            TxScript::Failed {
                pending_polls,
                kind,
            } if polls > pending_polls => TxStatus::Failed(kind),
            _ => TxStatus::Pending,
        };
        Ok(Some(status))
    }

    async fn account_nonce(&self, address: &str) -> Result<u64, CollaboratorError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }
        self.nonce_requests.write().await.push(address.to_string());
        Ok(*self.nonce.read().await)
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<String, CollaboratorError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }
        let mut sent = self.sent.write().await;
        let sequence = sent.len();
        if let Some(reason) = self.rejected_sends.write().await.remove(&sequence) {
            return Err(CollaboratorError::Rejected(reason));
        }
        sent.push(tx.clone());
        Ok(Self::hash_for(sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed(s: &str) -> SignedTransaction {
        SignedTransaction(s.to_string())
    }

    #[tokio::test]
    async fn test_sent_transactions_are_applied_after_pending_polls() {
        let chain = MockChain::new();
        chain.set_pending_polls(1).await;

        let hash = chain.send_transaction(&signed("a")).await.unwrap();
        assert_eq!(hash, MockChain::hash_for(0));
        assert_eq!(chain.tx_status(&hash).await.unwrap(), Some(TxStatus::Pending));
        assert_eq!(chain.tx_status(&hash).await.unwrap(), Some(TxStatus::Applied));
    }

    #[tokio::test]
    async fn test_unknown_hash_has_no_status() {
        let chain = MockChain::new();
        assert_eq!(chain.tx_status("5Jtx000009").await.unwrap(), None);
        assert_eq!(chain.tx_status("garbage").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scripted_failure_and_rejection() {
        let chain = MockChain::new();
        chain.fail_tx(0, 0, "Failed_InsufficientFee").await;
        chain.reject_send(1, "nonce too low").await;

        let hash = chain.send_transaction(&signed("a")).await.unwrap();
        assert_eq!(
            chain.tx_status(&hash).await.unwrap(),
            Some(TxStatus::Failed("Failed_InsufficientFee".to_string()))
        );
        assert!(matches!(
            chain.send_transaction(&signed("b")).await,
            Err(CollaboratorError::Rejected(_))
        ));
        // A rejected send does not consume a hash.
        assert_eq!(
            chain.send_transaction(&signed("c")).await.unwrap(),
            MockChain::hash_for(1)
        );
    }
}
