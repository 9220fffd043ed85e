// Module: http
// Signaling endpoint, static pages, and the room channel

pub mod channel;
pub mod error;
pub mod pages;
pub mod signal;
pub mod status;

use axum::{
    routing::{get, post},
    Router,
};
use livecast_core::Config;
use livecast_relay::SignalingService;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::rooms::RoomHub;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub signaling: Arc<SignalingService>,
    pub rooms: Arc<RoomHub>,
    pub config: Arc<Config>,
}

/// Create the HTTP router with all routes
pub fn create_router(
    signaling: Arc<SignalingService>,
    rooms: Arc<RoomHub>,
    config: Arc<Config>,
) -> Router {
    let state = AppState {
        signaling,
        rooms,
        config,
    };

    let router = Router::new()
        // Signaling
        .route("/offer", post(signal::handle_offer))
        .route("/ice-servers", get(signal::ice_servers))
        // Health & stats (for monitoring probes)
        .route("/healthz", get(status::healthz))
        .route("/stats", get(status::stats))
        // Static page delivery (thin I/O wrappers)
        .route("/broadcast", get(pages::broadcast_page))
        .route("/view/{stream_key}", get(pages::viewer_page))
        // Room presence & chat channel
        .route("/channel", get(channel::channel_handler));

    // Apply layers before state
    let router = router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Apply state to all routes (must be last)
    router.with_state(state)
}
