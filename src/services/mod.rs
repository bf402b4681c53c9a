//! Boundary to the five external analysis services.
//!
//! `AnalysisServices` is the single seam the orchestrator depends on:
//! - `HttpAnalysisClient`: the real backend over HTTP (reqwest)
//! - `MockAnalysisServices`: scripted responses for tests and offline demos
//!
//! How each service computes its answer is not this crate's concern; only
//! the request/response contract is.

pub mod error;
pub mod http;
pub mod mock;
pub mod wire;

use async_trait::async_trait;

use crate::evidence::EvidencePayload;
use crate::models::{Explanation, PriorIncident, ResponsePlan, RiskAssessment};

pub use error::ServiceError;
pub use http::HttpAnalysisClient;
pub use mock::MockAnalysisServices;
pub use wire::{BackendHealth, IngestedIntel};

/// The five analysis services plus a liveness probe.
#[async_trait]
pub trait AnalysisServices: Send + Sync {
    /// Backend liveness. Not part of a pipeline run.
    async fn health(&self) -> Result<BackendHealth, ServiceError>;

    /// Stage 1: perception / transcription of the raw evidence.
    async fn ingest(&self, evidence: &EvidencePayload) -> Result<IngestedIntel, ServiceError>;

    /// Stage 2: prior incidents similar to the description.
    async fn recall(&self, query: &str) -> Result<Vec<PriorIncident>, ServiceError>;

    /// Stage 3: risk scoring over the similar incidents.
    async fn assess_risk(
        &self,
        incidents: &[PriorIncident],
    ) -> Result<RiskAssessment, ServiceError>;

    /// Stage 4: response plan for the current situation.
    async fn plan(
        &self,
        description: &str,
        risk: &RiskAssessment,
        incidents: &[PriorIncident],
    ) -> Result<ResponsePlan, ServiceError>;

    /// Stage 5: rationale for the plan.
    async fn explain(
        &self,
        plan: &ResponsePlan,
        risk: &RiskAssessment,
        incidents: &[PriorIncident],
    ) -> Result<Explanation, ServiceError>;
}
