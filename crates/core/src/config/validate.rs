use super::{types::Config, ConfigError};
use crate::poller::PollSettings;

/// Validate configuration
/// Currently validates:
/// - Chain section exists (enforced by serde)
/// - Server port is not 0
/// - Gateway and explorer URLs are set
/// - Every polling site has a non-zero interval and attempt cap
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.gateway.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "gateway.url cannot be empty".to_string(),
        ));
    }

    if config.chain.explorer_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "chain.explorer_url cannot be empty".to_string(),
        ));
    }

    let issuance = &config.issuance;
    let sites: [(&str, &PollSettings); 5] = [
        ("pin", &issuance.pin),
        ("deploy_tx", &issuance.deploy_tx),
        ("state", &issuance.state),
        ("job", &issuance.job),
        ("mint_tx", &issuance.mint_tx),
    ];
    for (name, settings) in sites {
        if settings.interval_ms == 0 {
            return Err(ConfigError::ValidationError(format!(
                "issuance.{}.interval_ms cannot be 0",
                name
            )));
        }
        if settings.max_attempts == 0 {
            return Err(ConfigError::ValidationError(format!(
                "issuance.{}.max_attempts cannot be 0",
                name
            )));
        }
    }

    Ok(())
}
