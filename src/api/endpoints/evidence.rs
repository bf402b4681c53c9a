//! Evidence upload endpoint: dashboard file picker → analysis pipeline.
//!
//! `POST /api/evidence` takes multipart fields `file`, `type` and an
//! optional `location`. The pipeline runs in the background; the response
//! only says whether a run was admitted.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::core_state::Submission;
use crate::evidence::EvidenceFile;
use crate::models::{EvidenceKind, RunId};

#[derive(Serialize)]
pub struct SubmitResponse {
    pub run_id: RunId,
    pub status: &'static str,
}

/// Fields pulled out of the multipart body.
#[derive(Default)]
struct EvidenceForm {
    file: Option<EvidenceFile>,
    kind: Option<String>,
    location: Option<String>,
}

/// `POST /api/evidence`: 202 with the run id, 204 when no file was sent.
pub async fn submit(
    State(ctx): State<ApiContext>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_form(multipart).await?;

    let kind: EvidenceKind = form
        .kind
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Missing `type` field".into()))?
        .trim()
        .parse()
        .map_err(|e: crate::models::InvalidEnum| ApiError::BadRequest(e.to_string()))?;

    let submission = ctx
        .core
        .submit_evidence(form.file, kind, form.location.as_deref())
        .await?;

    match submission {
        Submission::Skipped => Ok(StatusCode::NO_CONTENT.into_response()),
        Submission::Started { run_id, .. } => Ok((
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                run_id,
                status: "accepted",
            }),
        )
            .into_response()),
    }
}

async fn read_form(mut multipart: Multipart) -> Result<EvidenceForm, ApiError> {
    let mut form = EvidenceForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.is_empty());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {e}")))?;
                // Browsers send an empty, unnamed part when nothing was picked
                if file_name.is_none() && bytes.is_empty() {
                    continue;
                }
                form.file = Some(EvidenceFile::new(file_name, bytes.to_vec()));
            }
            "type" | "location" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read `{name}`: {e}")))?;
                if name == "type" {
                    form.kind = Some(value);
                } else {
                    form.location = Some(value);
                }
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown evidence form field");
            }
        }
    }

    Ok(form)
}
