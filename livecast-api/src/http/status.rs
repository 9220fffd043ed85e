//! Health and stats endpoints

use axum::{extract::State, response::Json};
use livecast_relay::BroadcastSummary;
use serde::{Deserialize, Serialize};

use crate::http::AppState;
use crate::rooms::RoomSummary;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness probe
///
/// Path: `GET /healthz`
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    /// Live peer sessions (broadcasters + viewers)
    pub sessions: usize,
    /// Stream keys with active media and their track kinds
    pub broadcasts: Vec<BroadcastSummary>,
    /// Channel rooms and their member counts
    pub rooms: Vec<RoomSummary>,
}

/// Service-wide counters
///
/// Path: `GET /stats`
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let registry = state.signaling.registry();
    Json(StatsResponse {
        sessions: registry.len(),
        broadcasts: registry.broadcasts().summaries(),
        rooms: state.rooms.summaries(),
    })
}
