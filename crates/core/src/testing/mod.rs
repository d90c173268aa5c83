//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of all collaborator traits,
//! allowing whole issuance runs to be tested without a wallet, a chain or
//! a pinning service.
//!
//! # Example
//!
//! ```rust,ignore
//! use launchpad_core::testing::fixtures;
//!
//! let harness = fixtures::harness();
//!
//! // Configure mock responses
//! harness.chain.set_nonce(7).await;
//! harness.verifier.set_pending_polls(2).await;
//!
//! let report = harness.issuer.run(fixtures::request()).await?;
//! assert!(report.issued);
//! ```

mod mock_builder;
mod mock_chain;
mod mock_pinner;
mod mock_prover;
mod mock_validator;
mod mock_verifier;
mod mock_wallet;

pub use mock_builder::MockBuilder;
pub use mock_chain::MockChain;
pub use mock_pinner::MockPinner;
pub use mock_prover::MockProver;
pub use mock_validator::MockValidator;
pub use mock_verifier::MockVerifier;
pub use mock_wallet::MockWallet;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;

    use super::{
        MockBuilder, MockChain, MockPinner, MockProver, MockValidator, MockVerifier, MockWallet,
    };
    use crate::collaborators::{Collaborators, DeploymentKeys};
    use crate::config::{ChainConfig, ChainNetwork, MetadataConfig};
    use crate::issuance::{IssuanceConfig, IssueRequest, TokenIssuer};
    use crate::poller::PollSettings;
    use crate::timeline::{TimelineSink, TimelineStore};

    /// Address the mock wallet connects as.
    pub const ADMIN_ADDRESS: &str = "B62qobAYQBkpC8wVnRzydrtCgWdkYTqsfXTcaLdGq1imtqtKgAHN29K";
    pub const TOKEN_ADDRESS: &str = "B62qiq7iTTP7Z2KEpQ9eF9UVGLiEKAjBpz1yxyd2MwMrxVwpAMLta2h";
    pub const ADMIN_CONTRACT_ADDRESS: &str =
        "B62qrPN5Y5yq8kGE3FbVKbGTdTAJNdtNtB5sNVpxyRwWGcDEhpMzc8g";

    /// Mint recipients.
    pub const RECIPIENTS: [&str; 3] = [
        "B62qnzbXmRNo9q32n4SNu2mpB8e7FYYLH8NmaX6oFCBYjjQ8SbD7uzV",
        "B62qkR9iVZ3MTgbHAGe8a6sG7m7bW8zJoKWTZAm9rAp8ZJUAZj5KsUi",
        "B62qpg4UudqNoL2M3xThmYzMUYMYuYRLEcSB5pmmLtHXHsJPfMAVHcf",
    ];

    pub fn deployment_keys() -> DeploymentKeys {
        DeploymentKeys {
            token_address: TOKEN_ADDRESS.to_string(),
            admin_contract_address: ADMIN_CONTRACT_ADDRESS.to_string(),
            token_private_key: "EKtokenprivatekey".to_string(),
            admin_contract_private_key: "EKadminprivatekey".to_string(),
        }
    }

    /// `TEST` with one mint of 1000 to the first recipient.
    pub fn request() -> IssueRequest {
        IssueRequest {
            name: "Test Token".to_string(),
            description: "Token for tests".to_string(),
            website: "https://example.com".to_string(),
            ..IssueRequest::new("TEST")
        }
        .with_mint("1000", RECIPIENTS[0])
    }

    /// Short polling intervals and no pause between mint submissions.
    pub fn fast_config() -> IssuanceConfig {
        let poll = PollSettings::new(10, 100);
        IssuanceConfig {
            cloud_proving: false,
            pin: poll,
            deploy_tx: poll,
            state: poll,
            job: poll,
            mint_tx: poll,
            mint_submit_delay_ms: 0,
        }
    }

    pub fn chain_config() -> ChainConfig {
        ChainConfig::new(ChainNetwork::Devnet)
    }

    /// An issuer wired to fresh mocks, with handles to every mock.
    pub struct Harness {
        pub issuer: TokenIssuer,
        pub timeline: Arc<TimelineStore>,
        pub wallet: Arc<MockWallet>,
        pub validator: Arc<MockValidator>,
        pub pinner: Arc<MockPinner>,
        pub chain: Arc<MockChain>,
        pub prover: Arc<MockProver>,
        pub builder: Arc<MockBuilder>,
        pub verifier: Arc<MockVerifier>,
    }

    pub fn harness() -> Harness {
        harness_with(fast_config())
    }

    pub fn harness_with(config: IssuanceConfig) -> Harness {
        let timeline = Arc::new(TimelineStore::new());
        let wallet = Arc::new(MockWallet::new());
        let validator = Arc::new(MockValidator::new());
        let pinner = Arc::new(MockPinner::new());
        let chain = Arc::new(MockChain::new());
        let prover = Arc::new(MockProver::new());
        let builder = Arc::new(MockBuilder::new());
        let verifier = Arc::new(MockVerifier::new());

        let collaborators = Collaborators {
            wallet: wallet.clone(),
            validator: validator.clone(),
            pinner: pinner.clone(),
            chain: chain.clone(),
            prover: prover.clone(),
            builder: builder.clone(),
            verifier: verifier.clone(),
        };

        let issuer = TokenIssuer::new(
            config,
            chain_config(),
            MetadataConfig::default(),
            collaborators,
            timeline.clone() as Arc<dyn TimelineSink>,
        );

        Harness {
            issuer,
            timeline,
            wallet,
            validator,
            pinner,
            chain,
            prover,
            builder,
            verifier,
        }
    }
}
