use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Multipart framing and the text fields on top of the two files.
const FORM_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = (state.config.max_upload_size as usize)
        .saturating_mul(2)
        .saturating_add(FORM_OVERHEAD);

    Router::new()
        .route(
            "/songs",
            get(handlers::list_songs)
                .post(handlers::create_song)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/_internal/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
