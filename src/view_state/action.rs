//! Typed writes to the view-state and the notices they can carry.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Explanation, IntelItem, ResponsePlan, RiskAssessment, RunId};
use crate::pipeline::PipelineStage;

/// A typed write to the view-state. Every variant names the run it came from.
#[derive(Debug, Clone)]
pub enum ViewAction {
    /// Admit a new run. Rejected while another run is busy.
    BeginRun { run_id: RunId },
    IntelIngested { run_id: RunId, item: IntelItem },
    RiskAssessed { run_id: RunId, risk: RiskAssessment },
    PlanGenerated { run_id: RunId, plan: ResponsePlan },
    ExplanationReady { run_id: RunId, explanation: Explanation },
    /// Terminal for the run, on success and failure alike.
    FinishRun { run_id: RunId, outcome: RunOutcome },
}

impl ViewAction {
    pub fn run_id(&self) -> RunId {
        match self {
            Self::BeginRun { run_id }
            | Self::IntelIngested { run_id, .. }
            | Self::RiskAssessed { run_id, .. }
            | Self::PlanGenerated { run_id, .. }
            | Self::ExplanationReady { run_id, .. }
            | Self::FinishRun { run_id, .. } => *run_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BeginRun { .. } => "begin_run",
            Self::IntelIngested { .. } => "intel_ingested",
            Self::RiskAssessed { .. } => "risk_assessed",
            Self::PlanGenerated { .. } => "plan_generated",
            Self::ExplanationReady { .. } => "explanation_ready",
            Self::FinishRun { .. } => "finish_run",
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    Failed(FailureNotice),
}

/// Out-of-band failure notification for the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureNotice {
    pub run_id: RunId,
    /// Stage that failed; `None` when the run failed outside a stage.
    pub stage: Option<PipelineStage>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl FailureNotice {
    pub fn new(run_id: RunId, stage: Option<PipelineStage>, message: impl Into<String>) -> Self {
        Self {
            run_id,
            stage,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}
