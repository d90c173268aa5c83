//! Mock pinning service for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::collaborators::{CollaboratorError, PinStatus, Pinner};

/// Mock implementation of the Pinner trait.
///
/// Published content gets hashes `bafymeta0001`, `bafymeta0002`, ...; a hash
/// reports zero confirmations for `pending_polls` status calls, then one.
#[derive(Debug, Default)]
pub struct MockPinner {
    published: RwLock<Vec<String>>,
    status_calls: RwLock<HashMap<String, u32>>,
    pending_polls: RwLock<u32>,
    no_hash: RwLock<bool>,
    next_error: RwLock<Option<CollaboratorError>>,
}

impl MockPinner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content of every publish call, in order.
    pub async fn published(&self) -> Vec<String> {
        self.published.read().await.clone()
    }

    pub async fn set_pending_polls(&self, polls: u32) {
        *self.pending_polls.write().await = polls;
    }

    /// Make publish accept the call but return no hash.
    pub async fn set_returns_no_hash(&self, no_hash: bool) {
        *self.no_hash.write().await = no_hash;
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: CollaboratorError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn status_calls(&self, hash: &str) -> u32 {
        self.status_calls.read().await.get(hash).copied().unwrap_or(0)
    }

    pub fn url_for(hash: &str) -> String {
        format!("https://pin.example/ipfs/{}", hash)
    }

    async fn take_error(&self) -> Option<CollaboratorError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl Pinner for MockPinner {
    async fn publish(&self, content: &str) -> Result<Option<String>, CollaboratorError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }
        let mut published = self.published.write().await;
        published.push(content.to_string());
        if *self.no_hash.read().await {
            return Ok(None);
        }
        Ok(Some(format!("bafymeta{:04}", published.len())))
    }

    async fn status(&self, hash: &str) -> Result<PinStatus, CollaboratorError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }
        let mut calls = self.status_calls.write().await;
        let count = calls.entry(hash.to_string()).or_insert(0);
        *count += 1;

        let confirmed = *count > *self.pending_polls.read().await;
        Ok(PinStatus {
            success: true,
            confirmations: Some(if confirmed { 1 } else { 0 }),
            url: Some(Self::url_for(hash)),
        })
    }
}
