//! Console router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! REST routes are nested under `/api/`; the state stream lives at
//! `/ws/state`.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::api::websocket;
use crate::core_state::CoreState;

/// Room for multipart framing and the text fields around the file.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the console router.
pub fn console_router(core: Arc<CoreState>) -> Router {
    let body_limit = core.config.max_evidence_bytes + MULTIPART_OVERHEAD_BYTES;
    let ctx = ApiContext::new(core);

    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/state", get(endpoints::state::snapshot))
        .route(
            "/evidence",
            post(endpoints::evidence::submit).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/runs/cancel", post(endpoints::runs::cancel));

    Router::new()
        .nest("/api", api)
        .route("/ws/state", get(websocket::ws_upgrade))
        .with_state(ctx)
        // Dashboard is served from a different local origin
        .layer(CorsLayer::permissive())
}
