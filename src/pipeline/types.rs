use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use crate::config::AppConfig;
use crate::models::RunId;

/// One step of an analysis run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Ingest,
    Memory,
    Risk,
    Decision,
    Explain,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 5] = [
        Self::Ingest,
        Self::Memory,
        Self::Risk,
        Self::Decision,
        Self::Explain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Memory => "memory",
            Self::Risk => "risk",
            Self::Decision => "decision",
            Self::Explain => "explain",
        }
    }

    /// Operator-facing name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ingest => "Evidence ingest",
            Self::Memory => "Memory lookup",
            Self::Risk => "Risk assessment",
            Self::Decision => "Plan generation",
            Self::Explain => "Explanation",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Upper bound for each service call. `None` waits forever.
    pub stage_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout: AppConfig::default().stage_timeout,
        }
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            stage_timeout: config.stage_timeout,
        }
    }
}

/// What happened during one run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    /// Stages whose service call returned and whose result was recorded.
    pub completed: Vec<PipelineStage>,
    /// `None` when every stage completed.
    pub error: Option<PipelineError>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Stage that stopped the run, if any.
    pub fn failed_stage(&self) -> Option<PipelineStage> {
        self.error.as_ref().and_then(PipelineError::stage)
    }
}
