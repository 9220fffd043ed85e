//! Signaling HTTP endpoints
//!
//! `POST /offer` is the whole negotiation surface: broadcasters and
//! viewers both post an SDP offer tagged with their stream key and role
//! and receive the answer in the response body. `GET /ice-servers` hands
//! clients the ICE configuration this deployment negotiates with.

use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use livecast_relay::StreamKey;
use serde::{Deserialize, Serialize};

use crate::http::{AppError, AppResult, AppState};

/// Offer request body
#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    pub sdp: String,
    #[serde(rename = "type")]
    pub sdp_type: String,
    #[serde(rename = "streamKey")]
    pub stream_key: String,
    #[serde(default)]
    pub broadcaster: bool,
}

/// Answer response body
#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub sdp: String,
    #[serde(rename = "type")]
    pub sdp_type: String,
}

/// Negotiate a peer session
///
/// Path: `POST /offer`
///
/// Returns `400` on malformed SDP, `403` when a broadcaster's stream key
/// is rejected. A viewer posting an unknown stream key still receives a
/// valid (media-less) answer.
pub async fn handle_offer(
    State(state): State<AppState>,
    Json(req): Json<OfferRequest>,
) -> AppResult<impl IntoResponse> {
    if req.sdp_type != "offer" {
        return Err(AppError::bad_request(format!(
            "expected type \"offer\", got \"{}\"",
            req.sdp_type
        )));
    }

    let answer = state
        .signaling
        .handle_offer(req.sdp, StreamKey::new(req.stream_key), req.broadcaster)
        .await?;

    Ok(Json(AnswerResponse {
        sdp: answer.sdp,
        sdp_type: answer.sdp_type.to_string(),
    }))
}

/// ICE server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    /// URLs for the ICE server (e.g., ["stun:stun.example.com:3478"])
    pub urls: Vec<String>,
}

/// Response for ICE servers request
#[derive(Debug, Serialize, Deserialize)]
pub struct IceServersResponse {
    pub servers: Vec<IceServerConfig>,
}

/// Get the ICE servers clients should use for negotiation
///
/// Path: `GET /ice-servers`
pub async fn ice_servers(State(state): State<AppState>) -> Json<IceServersResponse> {
    let servers = if state.config.webrtc.ice_servers.is_empty() {
        Vec::new()
    } else {
        vec![IceServerConfig {
            urls: state.config.webrtc.ice_servers.clone(),
        }]
    };
    Json(IceServersResponse { servers })
}
