use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::RunId;

#[derive(Serialize)]
pub struct CancelResponse {
    pub run_id: RunId,
    pub status: &'static str,
}

/// `POST /api/runs/cancel`: stop the run in flight.
pub async fn cancel(
    State(ctx): State<ApiContext>,
) -> Result<(StatusCode, Json<CancelResponse>), ApiError> {
    let run_id = ctx
        .core
        .cancel_active_run()
        .await
        .ok_or_else(|| ApiError::NotFound("No run in progress".into()))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CancelResponse {
            run_id,
            status: "cancelling",
        }),
    ))
}
