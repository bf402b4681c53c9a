use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::error::ServiceError;
use super::wire::{BackendHealth, IngestedIntel};
use super::AnalysisServices;
use crate::evidence::EvidencePayload;
use crate::models::{Explanation, PriorIncident, ResponsePlan, RiskAssessment, RiskLevel};
use crate::pipeline::PipelineStage;

/// Scripted analysis services for testing and offline demos.
///
/// Defaults to the loading-dock gunshot scenario: two similar incidents,
/// CRITICAL risk, a two-step plan and a short narrative. Individual stages
/// can be made to fail or stall.
pub struct MockAnalysisServices {
    description: String,
    incidents: Vec<PriorIncident>,
    risk: RiskAssessment,
    plan: ResponsePlan,
    explanation: Explanation,
    fail_at: Option<PipelineStage>,
    delays: HashMap<PipelineStage, Duration>,
    ingest_counter: AtomicUsize,
    calls: Mutex<Vec<PipelineStage>>,
    plan_inputs: Mutex<Vec<RiskAssessment>>,
    explain_inputs: Mutex<Vec<(ResponsePlan, RiskAssessment)>>,
}

impl MockAnalysisServices {
    pub fn new() -> Self {
        let incidents = vec![
            incident(0.91, "Loading dock shooting", "casualty reported", "Lockdown and evacuate"),
            incident(0.78, "Armed robbery at depot", "critical injuries", "Cut access power"),
        ];
        Self {
            description: "Gunshot heard near loading dock".to_string(),
            incidents,
            risk: RiskAssessment::new(RiskLevel::Critical, 0.95),
            plan: ResponsePlan::new(vec![
                "Evacuate Sector 4".to_string(),
                "Cut Power Grid B".to_string(),
            ]),
            explanation: Explanation {
                narrative: "Pattern matches prior armed incident at the loading dock.".to_string(),
                confidence_reasoning: None,
            },
            fail_at: None,
            delays: HashMap::new(),
            ingest_counter: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            plan_inputs: Mutex::new(Vec::new()),
            explain_inputs: Mutex::new(Vec::new()),
        }
    }

    /// Make one stage answer with a 503.
    pub fn failing_at(mut self, stage: PipelineStage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    /// Delay one stage's answer.
    pub fn with_delay(mut self, stage: PipelineStage, delay: Duration) -> Self {
        self.delays.insert(stage, delay);
        self
    }

    pub fn with_risk(mut self, risk: RiskAssessment) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_incidents(mut self, incidents: Vec<PriorIncident>) -> Self {
        self.incidents = incidents;
        self
    }

    /// Stages called so far, in call order.
    pub fn calls(&self) -> Vec<PipelineStage> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Risk assessments the plan stage was asked to plan against.
    pub fn plan_inputs(&self) -> Vec<RiskAssessment> {
        self.plan_inputs.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Plan/risk pairs the explain stage was asked to justify.
    pub fn explain_inputs(&self) -> Vec<(ResponsePlan, RiskAssessment)> {
        self.explain_inputs.lock().map(|p| p.clone()).unwrap_or_default()
    }

    async fn enter(&self, stage: PipelineStage) -> Result<(), ServiceError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(stage);
        }
        if let Some(delay) = self.delays.get(&stage) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail_at == Some(stage) {
            return Err(ServiceError::Status {
                status: 503,
                body: format!("{stage} service unavailable"),
            });
        }
        Ok(())
    }
}

impl Default for MockAnalysisServices {
    fn default() -> Self {
        Self::new()
    }
}

fn incident(score: f64, name: &str, outcome: &str, action: &str) -> PriorIncident {
    PriorIncident {
        score,
        incident: name.to_string(),
        outcome: outcome.to_string(),
        action_taken: Some(action.to_string()),
        extra: serde_json::Map::new(),
    }
}

#[async_trait]
impl AnalysisServices for MockAnalysisServices {
    async fn health(&self) -> Result<BackendHealth, ServiceError> {
        Ok(BackendHealth {
            status: "Mock analysis backend".to_string(),
            agents: Some(5),
        })
    }

    async fn ingest(&self, _evidence: &EvidencePayload) -> Result<IngestedIntel, ServiceError> {
        self.enter(PipelineStage::Ingest).await?;
        let n = self.ingest_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(IngestedIntel {
            id: format!("x{n}"),
            description: self.description.clone(),
        })
    }

    async fn recall(&self, _query: &str) -> Result<Vec<PriorIncident>, ServiceError> {
        self.enter(PipelineStage::Memory).await?;
        Ok(self.incidents.clone())
    }

    async fn assess_risk(
        &self,
        _incidents: &[PriorIncident],
    ) -> Result<RiskAssessment, ServiceError> {
        self.enter(PipelineStage::Risk).await?;
        Ok(self.risk.clone())
    }

    async fn plan(
        &self,
        _description: &str,
        risk: &RiskAssessment,
        _incidents: &[PriorIncident],
    ) -> Result<ResponsePlan, ServiceError> {
        if let Ok(mut inputs) = self.plan_inputs.lock() {
            inputs.push(risk.clone());
        }
        self.enter(PipelineStage::Decision).await?;
        Ok(self.plan.clone())
    }

    async fn explain(
        &self,
        plan: &ResponsePlan,
        risk: &RiskAssessment,
        _incidents: &[PriorIncident],
    ) -> Result<Explanation, ServiceError> {
        if let Ok(mut inputs) = self.explain_inputs.lock() {
            inputs.push((plan.clone(), risk.clone()));
        }
        self.enter(PipelineStage::Explain).await?;
        Ok(self.explanation.clone())
    }
}
