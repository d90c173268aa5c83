//! Mock contract-state verifier for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::collaborators::{CollaboratorError, StateVerifier, TokenAddresses};

/// Mock implementation of the StateVerifier trait.
///
/// Reports a mismatch for `pending_polls` calls, then a match.
#[derive(Debug, Default)]
pub struct MockVerifier {
    checked: RwLock<Vec<TokenAddresses>>,
    pending_polls: RwLock<u32>,
    never_matches: RwLock<bool>,
    next_error: RwLock<Option<CollaboratorError>>,
}

impl MockVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_pending_polls(&self, polls: u32) {
        *self.pending_polls.write().await = polls;
    }

    pub async fn set_never_matches(&self, never: bool) {
        *self.never_matches.write().await = never;
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: CollaboratorError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn checked(&self) -> Vec<TokenAddresses> {
        self.checked.read().await.clone()
    }
}

#[async_trait]
impl StateVerifier for MockVerifier {
    async fn verify(&self, addresses: &TokenAddresses) -> Result<bool, CollaboratorError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        let mut checked = self.checked.write().await;
        checked.push(addresses.clone());
        if *self.never_matches.read().await {
            return Ok(false);
        }
        Ok(checked.len() as u32 > *self.pending_polls.read().await)
    }
}
