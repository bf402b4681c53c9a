use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::EvidenceKind;
use super::run::RunId;

/// One entry of the intel log: what the perception stage made of a
/// submitted file. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelItem {
    /// Identifier assigned by the ingest service.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EvidenceKind,
    pub description: String,
    pub location: String,
    pub captured_at: DateTime<Utc>,
    pub run_id: RunId,
}

impl IntelItem {
    pub fn new(
        id: String,
        kind: EvidenceKind,
        description: String,
        location: String,
        run_id: RunId,
    ) -> Self {
        Self {
            id,
            kind,
            description,
            location,
            captured_at: Utc::now(),
            run_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intel_item_serializes_kind_as_type() {
        let item = IntelItem::new(
            "x1".into(),
            EvidenceKind::Audio,
            "Gunshot heard near loading dock".into(),
            "Sector 4".into(),
            RunId::new(),
        );
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "audio");
        assert_eq!(json["id"], "x1");
        assert!(json["captured_at"].is_string());
    }
}
