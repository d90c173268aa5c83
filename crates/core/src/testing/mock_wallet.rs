//! Mock wallet connector for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::collaborators::{CollaboratorError, WalletConnection, WalletConnector};

use super::fixtures::ADMIN_ADDRESS;

/// Mock implementation of the WalletConnector trait.
///
/// Connects as [`ADMIN_ADDRESS`] unless told otherwise.
#[derive(Debug)]
pub struct MockWallet {
    connection: RwLock<WalletConnection>,
    next_error: RwLock<Option<CollaboratorError>>,
    connect_calls: RwLock<u32>,
}

impl Default for MockWallet {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWallet {
    pub fn new() -> Self {
        Self {
            connection: RwLock::new(WalletConnection::connected(ADMIN_ADDRESS)),
            next_error: RwLock::new(None),
            connect_calls: RwLock::new(0),
        }
    }

    /// Reply returned by every subsequent connect.
    pub async fn set_connection(&self, connection: WalletConnection) {
        *self.connection.write().await = connection;
    }

    /// Configure the next connect to fail with the given error.
    pub async fn set_next_error(&self, error: CollaboratorError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn connect_calls(&self) -> u32 {
        *self.connect_calls.read().await
    }
}

#[async_trait]
impl WalletConnector for MockWallet {
    async fn connect(&self) -> Result<WalletConnection, CollaboratorError> {
        *self.connect_calls.write().await += 1;
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        Ok(self.connection.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connects_as_admin_by_default() {
        let wallet = MockWallet::new();
        let connection = wallet.connect().await.unwrap();
        assert!(connection.success);
        assert_eq!(connection.address.as_deref(), Some(ADMIN_ADDRESS));
        assert_eq!(wallet.connect_calls().await, 1);
    }

    #[tokio::test]
    async fn test_next_error_is_consumed() {
        let wallet = MockWallet::new();
        wallet
            .set_next_error(CollaboratorError::Rejected("user declined".to_string()))
            .await;
        assert!(wallet.connect().await.is_err());
        assert!(wallet.connect().await.is_ok());
    }
}
