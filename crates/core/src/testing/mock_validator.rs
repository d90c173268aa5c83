//! Mock mint-entry validator for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::collaborators::MintValidator;

/// Accepts every entry except the recipients marked as rejected.
#[derive(Debug, Default)]
pub struct MockValidator {
    rejected: RwLock<Vec<String>>,
    checked: RwLock<Vec<(String, String)>>,
}

impl MockValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every entry addressed to `to`.
    pub async fn reject(&self, to: impl Into<String>) {
        self.rejected.write().await.push(to.into());
    }

    /// `(amount, to)` pairs seen so far.
    pub async fn checked(&self) -> Vec<(String, String)> {
        self.checked.read().await.clone()
    }
}

#[async_trait]
impl MintValidator for MockValidator {
    async fn is_valid_mint_entry(&self, amount: &str, to: &str) -> bool {
        self.checked
            .write()
            .await
            .push((amount.to_string(), to.to_string()));
        !to.is_empty() && !self.rejected.read().await.iter().any(|r| r == to)
    }
}
