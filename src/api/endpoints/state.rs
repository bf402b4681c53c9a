use axum::extract::State;
use axum::Json;

use crate::api::types::ApiContext;
use crate::view_state::ViewState;

/// `GET /api/state`: current dashboard snapshot.
pub async fn snapshot(State(ctx): State<ApiContext>) -> Json<ViewState> {
    Json(ctx.core.snapshot())
}
