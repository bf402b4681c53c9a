//! Request and response schemas for the five analysis services.
//!
//! Responses are deserialized leniently (every field optional) and then
//! validated into domain types, so a missing or malformed field fails the
//! stage with a typed error instead of travelling on to the next service.

use serde::{Deserialize, Serialize};

use super::error::ServiceError;
use crate::models::{Explanation, PriorIncident, ResponsePlan, RiskAssessment, RiskLevel};

// ═══════════════════════════════════════════════════════════
// Requests
// ═══════════════════════════════════════════════════════════

/// Body for `POST /agent/risk`.
#[derive(Debug, Serialize)]
pub struct RiskRequest<'a> {
    pub similar_incidents: &'a [PriorIncident],
}

/// Body for `POST /agent/decision`.
#[derive(Debug, Serialize)]
pub struct DecisionRequest<'a> {
    pub current_description: &'a str,
    pub risk_data: &'a RiskAssessment,
    pub past_incidents: &'a [PriorIncident],
}

/// Body for `POST /agent/explain`.
#[derive(Debug, Serialize)]
pub struct ExplainRequest<'a> {
    pub plan: &'a ResponsePlan,
    pub risk_data: &'a RiskAssessment,
    pub past_incidents: &'a [PriorIncident],
}

// ═══════════════════════════════════════════════════════════
// Responses
// ═══════════════════════════════════════════════════════════

/// Backend liveness as reported by `GET /`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendHealth {
    pub status: String,
    #[serde(default)]
    pub agents: Option<u32>,
}

/// What the ingest stage learned about a piece of evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedIntel {
    pub id: String,
    pub description: String,
}

/// Response body from `POST /ingest`.
#[derive(Debug, Deserialize)]
pub struct IngestResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub intel: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl IngestResponse {
    pub fn into_intel(self) -> Result<IngestedIntel, ServiceError> {
        reject_error_status(self.status.as_deref(), self.message.as_deref())?;

        let id = non_blank(self.id).ok_or(ServiceError::MissingField("id"))?;
        let description = match self.intel {
            None => return Err(ServiceError::MissingField("intel")),
            Some(text) if text.trim().is_empty() => {
                return Err(ServiceError::InvalidField {
                    field: "intel",
                    reason: "description is empty".into(),
                })
            }
            Some(text) => text.trim().to_string(),
        };

        Ok(IngestedIntel { id, description })
    }
}

/// `{status, data}` wrapper used by every `/agent/*` endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> Result<T, ServiceError> {
        reject_error_status(self.status.as_deref(), self.message.as_deref())?;
        self.data.ok_or(ServiceError::MissingField("data"))
    }
}

impl Envelope<Vec<PriorIncident>> {
    /// Memory lookups answer `no_matches` with an empty (or absent) list.
    pub fn into_incidents(self) -> Result<Vec<PriorIncident>, ServiceError> {
        if self.data.is_none() && self.status.as_deref() == Some("no_matches") {
            return Ok(Vec::new());
        }
        self.into_data()
    }
}

/// `data` of a risk response.
#[derive(Debug, Deserialize)]
pub struct RiskData {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub flagged_factors: Option<Vec<String>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RiskData {
    pub fn into_assessment(self) -> Result<RiskAssessment, ServiceError> {
        if let Some(error) = self.error {
            return Err(ServiceError::Rejected(error));
        }

        let raw_level = self.level.ok_or(ServiceError::MissingField("level"))?;
        let level = RiskLevel::parse_wire(&raw_level).map_err(|e| ServiceError::InvalidField {
            field: "level",
            reason: e.to_string(),
        })?;

        let score = self.score.ok_or(ServiceError::MissingField("score"))?;
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(ServiceError::InvalidField {
                field: "score",
                reason: format!("{score} is outside [0, 1]"),
            });
        }

        Ok(RiskAssessment {
            level,
            score,
            flagged_factors: self.flagged_factors.unwrap_or_default(),
        })
    }
}

/// `data` of a decision response. The LLM behind it reports failures in-band.
#[derive(Debug, Deserialize)]
pub struct DecisionData {
    #[serde(default)]
    pub immediate_actions: Option<Vec<String>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DecisionData {
    pub fn into_plan(self) -> Result<ResponsePlan, ServiceError> {
        if let Some(error) = self.error {
            let reason = match self.details {
                Some(details) => format!("{error}: {details}"),
                None => error,
            };
            return Err(ServiceError::Rejected(reason));
        }

        let actions = self
            .immediate_actions
            .ok_or(ServiceError::MissingField("immediate_actions"))?;

        Ok(ResponsePlan {
            immediate_actions: actions
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            extra: self.extra,
        })
    }
}

/// `data` of an explain response.
#[derive(Debug, Deserialize)]
pub struct ExplainData {
    #[serde(default)]
    pub narrative: Option<String>,
    /// Older explain services send `summary` when running without a model.
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub confidence_reasoning: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExplainData {
    pub fn into_explanation(self) -> Result<Explanation, ServiceError> {
        if let Some(error) = self.error {
            return Err(ServiceError::Rejected(error));
        }

        let narrative = non_blank(self.narrative)
            .or_else(|| non_blank(self.summary))
            .ok_or(ServiceError::MissingField("narrative"))?;

        Ok(Explanation {
            narrative,
            confidence_reasoning: non_blank(self.confidence_reasoning),
        })
    }
}

// ── Helpers ─────────────────────────────────────────────

fn reject_error_status(status: Option<&str>, message: Option<&str>) -> Result<(), ServiceError> {
    if status == Some("error") {
        return Err(ServiceError::Rejected(
            message.unwrap_or("service reported an error").to_string(),
        ));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
