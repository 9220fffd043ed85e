//! Static page delivery
//!
//! Thin I/O wrappers serving the broadcaster and viewer pages from the
//! configured web root. Everything interesting happens client-side.

use axum::{
    extract::{Path, State},
    response::Html,
};
use tracing::debug;

use crate::http::{AppError, AppResult, AppState};

/// Page for broadcasters to go live
///
/// Path: `GET /broadcast`
pub async fn broadcast_page(State(state): State<AppState>) -> AppResult<Html<String>> {
    serve_page(&state, "broadcast.html").await
}

/// Page for viewers to watch a stream
///
/// Path: `GET /view/{stream_key}`
pub async fn viewer_page(
    State(state): State<AppState>,
    Path(_stream_key): Path<String>,
) -> AppResult<Html<String>> {
    serve_page(&state, "viewer.html").await
}

async fn serve_page(state: &AppState, name: &str) -> AppResult<Html<String>> {
    let path = std::path::Path::new(&state.config.server.web_root).join(name);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Ok(Html(content)),
        Err(e) => {
            debug!(page = name, error = %e, "page file unavailable");
            Err(AppError::not_found(format!("page {name} not available")))
        }
    }
}
