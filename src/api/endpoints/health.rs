//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub busy: bool,
    pub backend: BackendStatus,
}

#[derive(Serialize)]
pub struct BackendStatus {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agents: Option<u32>,
}

/// `GET /api/health`: console liveness plus a backend probe.
///
/// Always answers 200; an unreachable backend is reported in the body.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    let backend = match ctx.core.backend_health().await {
        Ok(health) => BackendStatus {
            reachable: true,
            message: Some(health.status),
            agents: health.agents,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Analysis backend health probe failed");
            BackendStatus {
                reachable: false,
                message: Some(e.to_string()),
                agents: None,
            }
        }
    };

    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        busy: ctx.core.is_busy(),
        backend,
    })
}
