use serde::{Deserialize, Serialize};

use super::enums::RiskLevel;

/// A past incident the memory service judged similar to the current intel.
///
/// Fields the console does not interpret (`year`, ...) are kept verbatim
/// so they reach the risk, decision and explain services unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorIncident {
    /// Similarity to the current intel, as reported by the memory service.
    #[serde(default)]
    pub score: f64,
    #[serde(default = "unknown_incident")]
    pub incident: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_taken: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn unknown_incident() -> String {
    "Unknown".to_string()
}

/// Output of the risk stage. Replaced wholesale on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// Normalized score in `[0, 1]`.
    pub score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flagged_factors: Vec<String>,
}

impl RiskAssessment {
    pub fn new(level: RiskLevel, score: f64) -> Self {
        Self {
            level,
            score,
            flagged_factors: Vec::new(),
        }
    }
}

/// Output of the decision stage.
///
/// Anything the decision service adds beside `immediate_actions` is kept
/// in `extra` and sent on to the explain service as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePlan {
    pub immediate_actions: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ResponsePlan {
    pub fn new(immediate_actions: Vec<String>) -> Self {
        Self {
            immediate_actions,
            extra: serde_json::Map::new(),
        }
    }
}

/// Output of the explain stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub narrative: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_reasoning: Option<String>,
}
