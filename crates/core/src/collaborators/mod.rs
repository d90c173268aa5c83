//! External collaborators consumed by the issuance workflow.
//!
//! Wallet, chain, proving, pinning and contract-state services are opaque to
//! the orchestrator; it only sees the narrow traits defined here. The
//! [`HttpGateway`] implements all of them against a JSON bridge service, and
//! `crate::testing` provides scripted mocks.

mod error;
mod gateway;
mod traits;
mod types;
mod validator;

pub use error::CollaboratorError;
pub use gateway::HttpGateway;
pub use traits::{
    ChainClient, MintValidator, Pinner, ProvingService, StateVerifier, TokenBuilder,
    WalletConnector,
};
pub use types::{
    DeployRequest, DeploymentKeys, JobResult, MintTransactionRequest, PinStatus,
    SignedTransaction, TokenAddresses, TxStatus, UnsignedTransaction, WalletConnection,
};
pub use validator::{format_amount, parse_amount, AddressValidator, AMOUNT_DECIMALS};

use std::sync::Arc;

/// The full set of collaborators a run needs.
#[derive(Clone)]
pub struct Collaborators {
    pub wallet: Arc<dyn WalletConnector>,
    pub validator: Arc<dyn MintValidator>,
    pub pinner: Arc<dyn Pinner>,
    pub chain: Arc<dyn ChainClient>,
    pub prover: Arc<dyn ProvingService>,
    pub builder: Arc<dyn TokenBuilder>,
    pub verifier: Arc<dyn StateVerifier>,
}

impl Collaborators {
    /// Use one gateway for every remote service and the offline address validator.
    pub fn from_gateway(gateway: Arc<HttpGateway>) -> Self {
        Self {
            wallet: Arc::clone(&gateway) as Arc<dyn WalletConnector>,
            validator: Arc::new(AddressValidator::new()),
            pinner: Arc::clone(&gateway) as Arc<dyn Pinner>,
            chain: Arc::clone(&gateway) as Arc<dyn ChainClient>,
            prover: Arc::clone(&gateway) as Arc<dyn ProvingService>,
            builder: Arc::clone(&gateway) as Arc<dyn TokenBuilder>,
            verifier: gateway as Arc<dyn StateVerifier>,
        }
    }
}
