//! Issuance API handlers.

use axum::{extract::State, http::StatusCode, Json};
use launchpad_core::{IssuanceError, IssueRequest, IssuerStatus, TimelineItem};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub run_id: String,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
pub struct TimelineResponse {
    pub items: Vec<TimelineItem>,
}

#[derive(Debug, Serialize)]
pub struct IssuanceErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Start an issuance run in the background.
///
/// Responds as soon as the run is accepted; progress goes to the timeline.
pub async fn start_issuance(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IssueRequest>,
) -> Result<(StatusCode, Json<StartResponse>), (StatusCode, Json<IssuanceErrorResponse>)> {
    let handle = state.issuer().issue_token(request).map_err(|e| {
        let status = match e {
            IssuanceError::AlreadyRunning => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!("Rejected issuance request: {}", e);
        (
            status,
            Json(IssuanceErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    let run_id = handle.run_id.clone();
    info!(run_id = %run_id, "Issuance run accepted");

    let broadcaster = state.ws_broadcaster().clone();
    broadcaster.run_started(&run_id);
    tokio::spawn(async move {
        if let Some(report) = handle.join().await {
            broadcaster.run_finished(report);
        }
    });

    Ok((StatusCode::ACCEPTED, Json(StartResponse { run_id })))
}

/// Request cancellation of the active run.
pub async fn cancel_issuance(State(state): State<Arc<AppState>>) -> Json<CancelResponse> {
    Json(CancelResponse {
        cancelled: state.issuer().cancel(),
    })
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<IssuerStatus> {
    Json(state.issuer().status())
}

/// Committed log followed by the current slot.
pub async fn get_timeline(State(state): State<Arc<AppState>>) -> Json<TimelineResponse> {
    Json(TimelineResponse {
        items: state.timeline().render(),
    })
}
