//! Evidence submission: turns an operator-chosen file into the payload the
//! ingest stage uploads.
//!
//! A missing file is a no-op (`Ok(None)`), not an error. The payload never
//! talks to a service; `CoreState::submit_evidence` hands it to the
//! orchestrator once the run has been admitted.

use serde::Serialize;

use crate::models::EvidenceKind;

/// Raw file as selected by the operator.
#[derive(Debug, Clone)]
pub struct EvidenceFile {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl EvidenceFile {
    pub fn new(file_name: Option<String>, bytes: Vec<u8>) -> Self {
        Self { file_name, bytes }
    }
}

/// Transfer payload for the ingest stage.
#[derive(Debug, Clone)]
pub struct EvidencePayload {
    pub kind: EvidenceKind,
    pub location: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Summary of a payload, safe to log or return to a client.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceSummary {
    pub kind: EvidenceKind,
    pub location: String,
    pub file_name: String,
    pub mime: String,
    pub size_bytes: usize,
}

impl EvidencePayload {
    pub fn summary(&self) -> EvidenceSummary {
        EvidenceSummary {
            kind: self.kind,
            location: self.location.clone(),
            file_name: self.file_name.clone(),
            mime: self.mime.clone(),
            size_bytes: self.bytes.len(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EvidenceError {
    #[error("Evidence file is empty")]
    EmptyFile,
    #[error("Evidence file is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
}

/// Limits and defaults applied while packaging evidence.
#[derive(Debug, Clone)]
pub struct EvidencePolicy {
    pub default_location: String,
    pub max_bytes: usize,
}

impl From<&crate::config::AppConfig> for EvidencePolicy {
    fn from(config: &crate::config::AppConfig) -> Self {
        Self {
            default_location: config.default_location.clone(),
            max_bytes: config.max_evidence_bytes,
        }
    }
}

/// Package a file for the ingest stage.
///
/// Returns `Ok(None)` when no file was chosen.
pub fn build_payload(
    file: Option<EvidenceFile>,
    kind: EvidenceKind,
    location: Option<&str>,
    policy: &EvidencePolicy,
) -> Result<Option<EvidencePayload>, EvidenceError> {
    let Some(file) = file else {
        return Ok(None);
    };

    if file.bytes.is_empty() {
        return Err(EvidenceError::EmptyFile);
    }
    if file.bytes.len() > policy.max_bytes {
        return Err(EvidenceError::TooLarge {
            size: file.bytes.len(),
            limit: policy.max_bytes,
        });
    }

    let location = location
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(policy.default_location.as_str())
        .to_string();

    let file_name = file
        .file_name
        .as_deref()
        .map(sanitize_file_name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("evidence.{}", default_extension(kind)));

    let mime = guess_mime(&file_name, kind);

    Ok(Some(EvidencePayload {
        kind,
        location,
        file_name,
        mime,
        bytes: file.bytes,
    }))
}

/// MIME type from the file name, or a generic one for the evidence kind.
///
/// A guess from the wrong family (an image name on an audio submission)
/// is ignored; the kind tag wins.
fn guess_mime(file_name: &str, kind: EvidenceKind) -> String {
    let family = match kind {
        EvidenceKind::Audio => mime_guess::mime::AUDIO,
        EvidenceKind::Image => mime_guess::mime::IMAGE,
    };
    mime_guess::from_path(file_name)
        .iter()
        .find(|m| m.type_() == family)
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| kind.fallback_mime().to_string())
}

fn default_extension(kind: EvidenceKind) -> &'static str {
    match kind {
        EvidenceKind::Audio => "mp3",
        EvidenceKind::Image => "jpg",
    }
}

/// Strip any directory part a browser or client may have sent.
fn sanitize_file_name(raw: &str) -> String {
    raw.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> EvidencePolicy {
        EvidencePolicy {
            default_location: "Sector 4".into(),
            max_bytes: 1024,
        }
    }

    fn file(name: Option<&str>, size: usize) -> EvidenceFile {
        EvidenceFile::new(name.map(str::to_string), vec![7u8; size])
    }

    #[test]
    fn missing_file_is_noop() {
        let result = build_payload(None, EvidenceKind::Audio, None, &policy()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn payload_carries_kind_bytes_and_default_location() {
        let payload = build_payload(
            Some(file(Some("dock.wav"), 16)),
            EvidenceKind::Audio,
            None,
            &policy(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(payload.kind, EvidenceKind::Audio);
        assert_eq!(payload.location, "Sector 4");
        assert_eq!(payload.bytes.len(), 16);
        assert_eq!(payload.file_name, "dock.wav");
        assert!(payload.mime.starts_with("audio/"));
    }

    #[test]
    fn caller_location_overrides_default() {
        let payload = build_payload(
            Some(file(Some("drone.png"), 4)),
            EvidenceKind::Image,
            Some("  Gate 7 "),
            &policy(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(payload.location, "Gate 7");
        assert_eq!(payload.mime, "image/png");
    }

    #[test]
    fn blank_location_falls_back() {
        let payload = build_payload(Some(file(None, 4)), EvidenceKind::Image, Some(" "), &policy())
        .unwrap()
        .unwrap();
        assert_eq!(payload.location, "Sector 4");
    }

    #[test]
    fn unnamed_file_gets_kind_default_name() {
        let payload = build_payload(Some(file(None, 4)), EvidenceKind::Image, None, &policy())
        .unwrap()
        .unwrap();
        assert_eq!(payload.file_name, "evidence.jpg");
        assert_eq!(payload.mime, "image/jpeg");
    }

    #[test]
    fn mismatched_extension_uses_kind_fallback() {
        let payload = build_payload(
            Some(file(Some("photo.png"), 4)),
            EvidenceKind::Audio,
            None,
            &policy(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(payload.mime, "audio/mpeg");
    }

    #[test]
    fn directory_components_stripped_from_name() {
        let payload = build_payload(
            Some(file(Some("C:\\uploads\\cam/feed.jpg"), 4)),
            EvidenceKind::Image,
            None,
            &policy(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(payload.file_name, "feed.jpg");
    }

    #[test]
    fn empty_file_rejected() {
        let err = build_payload(
            Some(file(Some("a.wav"), 0)),
            EvidenceKind::Audio,
            None,
            &policy(),
        )
        .unwrap_err();
        assert_eq!(err, EvidenceError::EmptyFile);
    }

    #[test]
    fn oversized_file_rejected() {
        let err = build_payload(
            Some(file(Some("a.wav"), 2048)),
            EvidenceKind::Audio,
            None,
            &policy(),
        )
        .unwrap_err();
        assert_eq!(err, EvidenceError::TooLarge { size: 2048, limit: 1024 });
    }

    #[test]
    fn summary_reports_size() {
        let payload = build_payload(
            Some(file(Some("a.wav"), 10)),
            EvidenceKind::Audio,
            None,
            &policy(),
        )
        .unwrap()
        .unwrap();
        let summary = payload.summary();
        assert_eq!(summary.size_bytes, 10);
        assert_eq!(summary.file_name, "a.wav");
    }
}
