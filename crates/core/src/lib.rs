pub mod collaborators;
pub mod config;
pub mod issuance;
pub mod metrics;
pub mod poller;
pub mod testing;
pub mod timeline;

pub use collaborators::{
    AddressValidator, ChainClient, CollaboratorError, Collaborators, HttpGateway, MintValidator,
    Pinner, ProvingService, StateVerifier, TokenBuilder, WalletConnector,
};
pub use config::{
    load_config, load_config_from_str, validate_config, ChainConfig, ChainNetwork, Config,
    ConfigError, GatewayConfig, MetadataConfig, SanitizedConfig, ServerConfig,
};
pub use issuance::{
    IssuanceConfig, IssuanceError, IssueRequest, IssuerStatus, MintRequest, RunHandle, RunPhase,
    RunReport, TokenIssuer,
};
pub use poller::{wait_until, CancelToken, PollOutcome, PollSettings, WaitError};
pub use timeline::{
    Description, Segment, TimelineItem, TimelineSink, TimelineSnapshot, TimelineStatus,
    TimelineStore, TimelineUpdate,
};
