use std::time::Duration;

use super::types::PipelineStage;
use crate::services::ServiceError;
use crate::view_state::{RejectReason, StoreClosed};

/// Why a run stopped early.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{} failed: {source}", .stage.label())]
    StageFailed {
        stage: PipelineStage,
        #[source]
        source: ServiceError,
    },

    #[error("{} timed out after {}s", .stage.label(), .timeout.as_secs_f32())]
    StageTimedOut {
        stage: PipelineStage,
        timeout: Duration,
    },

    #[error("Run cancelled during {}", .stage.label())]
    Cancelled { stage: PipelineStage },

    #[error("{} result discarded: {reason}", .stage.label())]
    WriteRejected {
        stage: PipelineStage,
        reason: RejectReason,
    },

    #[error("View-state store is closed")]
    StoreClosed,
}

impl PipelineError {
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::StageFailed { stage, .. }
            | Self::StageTimedOut { stage, .. }
            | Self::Cancelled { stage }
            | Self::WriteRejected { stage, .. } => Some(*stage),
            Self::StoreClosed => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl From<StoreClosed> for PipelineError {
    fn from(_: StoreClosed) -> Self {
        Self::StoreClosed
    }
}
