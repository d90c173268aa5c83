//! Token issuance workflow.
//!
//! [`TokenIssuer`] runs one issuance at a time through its stages, recording
//! progress in a [`crate::timeline::TimelineSink`]:
//! - **Sequential**: validation, wallet, metadata, deploy, confirmations, mint submission
//! - **Overlapped**: metadata confirmation runs while deployment keys are generated
//! - **Concurrent**: mint confirmations are awaited together

mod config;
mod runner;
mod types;

pub use config::IssuanceConfig;
pub use runner::TokenIssuer;
pub use types::{
    mint_memo, IssuanceError, IssueRequest, IssuerStatus, MintRequest, RunHandle, RunPhase,
    RunReport, TokenMetadata, VerifiedMint, MAX_SYMBOL_LEN,
};
