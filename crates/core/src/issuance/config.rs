//! Issuance configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::poller::PollSettings;

/// Timing and proving options for token issuance runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuanceConfig {
    /// Delegate proof generation to the cloud proving service.
    /// When disabled, transactions are proved through the token builder.
    #[serde(default)]
    pub cloud_proving: bool,

    /// Waiting for pinned metadata to be included in storage.
    #[serde(default = "default_pin")]
    pub pin: PollSettings,

    /// Waiting for the deployment transaction to be applied.
    #[serde(default = "default_deploy_tx")]
    pub deploy_tx: PollSettings,

    /// Re-reading contract state after deployment.
    #[serde(default = "default_state")]
    pub state: PollSettings,

    /// Waiting for a cloud proving job.
    #[serde(default = "default_job")]
    pub job: PollSettings,

    /// Waiting for each mint transaction to be applied.
    #[serde(default = "default_mint_tx")]
    pub mint_tx: PollSettings,

    /// Pause between sequential mint submissions (milliseconds).
    #[serde(default = "default_mint_submit_delay")]
    pub mint_submit_delay_ms: u64,
}

fn default_pin() -> PollSettings {
    PollSettings::new(5000, 100)
}

fn default_deploy_tx() -> PollSettings {
    PollSettings::new(20000, 100)
}

fn default_state() -> PollSettings {
    PollSettings::new(10000, 100)
}

fn default_job() -> PollSettings {
    PollSettings::new(10000, 100)
}

fn default_mint_tx() -> PollSettings {
    PollSettings::new(20000, 100)
}

fn default_mint_submit_delay() -> u64 {
    1000
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            cloud_proving: false,
            pin: default_pin(),
            deploy_tx: default_deploy_tx(),
            state: default_state(),
            job: default_job(),
            mint_tx: default_mint_tx(),
            mint_submit_delay_ms: default_mint_submit_delay(),
        }
    }
}

impl IssuanceConfig {
    pub fn mint_submit_delay(&self) -> Duration {
        Duration::from_millis(self.mint_submit_delay_ms)
    }
}
