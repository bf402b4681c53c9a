use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;

use super::error::ServiceError;
use super::wire::{
    BackendHealth, DecisionData, DecisionRequest, Envelope, ExplainData, ExplainRequest,
    IngestResponse, IngestedIntel, RiskData, RiskRequest,
};
use super::AnalysisServices;
use crate::config::AppConfig;
use crate::evidence::EvidencePayload;
use crate::models::{Explanation, PriorIncident, ResponsePlan, RiskAssessment};

/// Longest error body kept in a `ServiceError::Status`.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// HTTP client for the analysis backend.
///
/// Only a connect timeout is set here. Per-stage deadlines belong to the
/// orchestrator, which also owns cancellation.
pub struct HttpAnalysisClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAnalysisClient {
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("aura/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        Self::new(&config.backend_url, config.connect_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_send_error(&self, e: reqwest::Error) -> ServiceError {
        if e.is_connect() {
            ServiceError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            ServiceError::Timeout(e.to_string())
        } else {
            ServiceError::Http(e.to_string())
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ServiceError> {
        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_send_error(e))?;
        serde_json::from_slice(&body).map_err(|e| ServiceError::ResponseParsing(e.to_string()))
    }
}

#[async_trait]
impl AnalysisServices for HttpAnalysisClient {
    async fn health(&self) -> Result<BackendHealth, ServiceError> {
        self.send_json(self.client.get(self.url("/"))).await
    }

    async fn ingest(&self, evidence: &EvidencePayload) -> Result<IngestedIntel, ServiceError> {
        let part = Part::bytes(evidence.bytes.clone())
            .file_name(evidence.file_name.clone())
            .mime_str(&evidence.mime)
            .map_err(|e| ServiceError::Http(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("type", evidence.kind.as_str())
            .text("location", evidence.location.clone());

        let response: IngestResponse = self
            .send_json(self.client.post(self.url("/ingest")).multipart(form))
            .await?;
        response.into_intel()
    }

    async fn recall(&self, query: &str) -> Result<Vec<PriorIncident>, ServiceError> {
        let envelope: Envelope<Vec<PriorIncident>> = self
            .send_json(
                self.client
                    .get(self.url("/agent/memory"))
                    .query(&[("query", query)]),
            )
            .await?;
        envelope.into_incidents()
    }

    async fn assess_risk(
        &self,
        incidents: &[PriorIncident],
    ) -> Result<RiskAssessment, ServiceError> {
        let body = RiskRequest {
            similar_incidents: incidents,
        };
        let envelope: Envelope<RiskData> = self
            .send_json(self.client.post(self.url("/agent/risk")).json(&body))
            .await?;
        envelope.into_data()?.into_assessment()
    }

    async fn plan(
        &self,
        description: &str,
        risk: &RiskAssessment,
        incidents: &[PriorIncident],
    ) -> Result<ResponsePlan, ServiceError> {
        let body = DecisionRequest {
            current_description: description,
            risk_data: risk,
            past_incidents: incidents,
        };
        let envelope: Envelope<DecisionData> = self
            .send_json(self.client.post(self.url("/agent/decision")).json(&body))
            .await?;
        envelope.into_data()?.into_plan()
    }

    async fn explain(
        &self,
        plan: &ResponsePlan,
        risk: &RiskAssessment,
        incidents: &[PriorIncident],
    ) -> Result<Explanation, ServiceError> {
        let body = ExplainRequest {
            plan,
            risk_data: risk,
            past_incidents: incidents,
        };
        let envelope: Envelope<ExplainData> = self
            .send_json(self.client.post(self.url("/agent/explain")).json(&body))
            .await?;
        envelope.into_data()?.into_explanation()
    }
}
