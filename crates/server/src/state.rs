use std::sync::Arc;

use launchpad_core::{Config, SanitizedConfig, TimelineStore, TokenIssuer};

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    issuer: TokenIssuer,
    timeline: Arc<TimelineStore>,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    pub fn new(
        config: Config,
        issuer: TokenIssuer,
        timeline: Arc<TimelineStore>,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        Self {
            config,
            issuer,
            timeline,
            ws_broadcaster,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn timeline(&self) -> &TimelineStore {
        self.timeline.as_ref()
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }
}
