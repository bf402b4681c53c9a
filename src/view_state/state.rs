//! The dashboard view-state: what presentation surfaces render.

use std::collections::VecDeque;

use serde::Serialize;

use crate::models::{Explanation, IntelItem, ResponsePlan, RiskAssessment, RunId};

/// Everything presentation surfaces render.
///
/// `risk`, `plan` and `explanation` always belong to `active_run`; starting
/// a run clears them. The intel log is newest-first and only grows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewState {
    pub intel_log: VecDeque<IntelItem>,
    pub risk: Option<RiskAssessment>,
    pub plan: Option<ResponsePlan>,
    pub explanation: Option<Explanation>,
    pub busy: bool,
    /// Most recently started run.
    pub active_run: Option<RunId>,
    /// Bumped on every applied write.
    pub version: u64,
}

impl ViewState {
    /// Whether `run_id` may still write to the state.
    pub fn accepts_writes_from(&self, run_id: RunId) -> bool {
        self.busy && self.active_run == Some(run_id)
    }
}
