//! Five-stage analysis pipeline: ingest → memory → risk → decision → explain.
//!
//! The orchestrator is the only writer to the view-state. It talks to the
//! backend exclusively through the `AnalysisServices` trait so runs can be
//! driven by the HTTP client in production and by mocks in tests.

pub mod error;
pub mod orchestrator;
pub mod types;

pub use error::PipelineError;
pub use orchestrator::PipelineOrchestrator;
pub use types::{PipelineConfig, PipelineStage, RunReport};
