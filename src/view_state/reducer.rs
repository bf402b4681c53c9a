//! Pure state transitions for the view-state.
//!
//! Rules:
//! - `BeginRun` is refused while busy (single-flight) and clears the
//!   previous risk/plan/explanation so the triple always belongs to the
//!   active run.
//! - Every other action is applied only while its run is the active,
//!   busy run. Late writes from any other run are discarded.
//! - A plan needs a risk from the same run; an explanation needs a plan.

use super::action::ViewAction;
use super::state::ViewState;
use crate::models::RunId;

/// Why a write was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Another run is in flight.
    Busy { active: RunId },
    /// The write came from a run that is not the active, busy run.
    StaleRun { active: Option<RunId> },
    /// A causally later result arrived before its prerequisite.
    OutOfOrder { missing: &'static str },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Busy { active } => write!(f, "run {active} is still in progress"),
            Self::StaleRun { active: Some(active) } => {
                write!(f, "write is stale (active run is {active})")
            }
            Self::StaleRun { active: None } => write!(f, "write is stale (no active run)"),
            Self::OutOfOrder { missing } => write!(f, "{missing} has not been recorded yet"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    Applied,
    Rejected(RejectReason),
}

impl Reduction {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Apply one action to the state.
pub fn reduce(state: &mut ViewState, action: ViewAction) -> Reduction {
    let is_begin = matches!(action, ViewAction::BeginRun { .. });
    if !is_begin && !state.accepts_writes_from(action.run_id()) {
        return Reduction::Rejected(RejectReason::StaleRun {
            active: state.active_run,
        });
    }

    match action {
        ViewAction::BeginRun { run_id } => {
            if let (true, Some(active)) = (state.busy, state.active_run) {
                return Reduction::Rejected(RejectReason::Busy { active });
            }
            state.busy = true;
            state.active_run = Some(run_id);
            state.risk = None;
            state.plan = None;
            state.explanation = None;
        }
        ViewAction::IntelIngested { item, .. } => {
            state.intel_log.push_front(item);
        }
        ViewAction::RiskAssessed { risk, .. } => {
            state.risk = Some(risk);
        }
        ViewAction::PlanGenerated { plan, .. } => {
            if state.risk.is_none() {
                return Reduction::Rejected(RejectReason::OutOfOrder { missing: "risk" });
            }
            state.plan = Some(plan);
        }
        ViewAction::ExplanationReady { explanation, .. } => {
            if state.plan.is_none() {
                return Reduction::Rejected(RejectReason::OutOfOrder { missing: "plan" });
            }
            state.explanation = Some(explanation);
        }
        ViewAction::FinishRun { .. } => {
            state.busy = false;
        }
    }

    state.version += 1;
    Reduction::Applied
}
