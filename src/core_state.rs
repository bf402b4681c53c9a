//! Shared application state for the console.
//!
//! `CoreState` is wrapped in `Arc` at startup and handed to every axum
//! handler. It owns the view-state store, the orchestrator and the
//! cancellation token of the run in flight.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::evidence::{
    build_payload, EvidenceError, EvidenceFile, EvidencePayload, EvidencePolicy,
};
use crate::models::{EvidenceKind, RunId};
use crate::pipeline::{PipelineConfig, PipelineOrchestrator, RunReport};
use crate::services::{AnalysisServices, BackendHealth, HttpAnalysisClient, ServiceError};
use crate::view_state::{
    Reduction, RejectReason, StoreClosed, ViewAction, ViewState, ViewStoreHandle,
};

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: AppConfig,
    policy: EvidencePolicy,
    services: Arc<dyn AnalysisServices>,
    store: ViewStoreHandle,
    orchestrator: PipelineOrchestrator,
    /// Token of the run in flight. Uses tokio Mutex for async.
    active: tokio::sync::Mutex<Option<(RunId, CancellationToken)>>,
}

impl CoreState {
    /// Build state around any services implementation.
    ///
    /// Spawns the store task, so it must be called inside a tokio runtime.
    pub fn new(config: AppConfig, services: Arc<dyn AnalysisServices>) -> Self {
        let store = ViewStoreHandle::spawn();
        let orchestrator = PipelineOrchestrator::new(
            services.clone(),
            store.clone(),
            PipelineConfig::from(&config),
        );
        Self {
            policy: EvidencePolicy::from(&config),
            config,
            services,
            store,
            orchestrator,
            active: tokio::sync::Mutex::new(None),
        }
    }

    /// Build state talking to the HTTP backend named in the config.
    pub fn from_config(config: AppConfig) -> Result<Self, CoreError> {
        let client = HttpAnalysisClient::from_config(&config)?;
        tracing::info!(backend = %client.base_url(), "Analysis backend configured");
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn store(&self) -> &ViewStoreHandle {
        &self.store
    }

    pub fn snapshot(&self) -> ViewState {
        self.store.snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.store.is_busy()
    }

    pub async fn backend_health(&self) -> Result<BackendHealth, ServiceError> {
        self.services.health().await
    }

    // ── Runs ────────────────────────────────────────────────

    /// Package the file, admit a run and start the pipeline in the background.
    ///
    /// No file means nothing to do. Busy is set before this returns, so
    /// a second submission racing this one is refused. Admission runs on
    /// its own task: dropping this future never strands a busy flag
    /// without a run behind it.
    pub async fn submit_evidence(
        self: &Arc<Self>,
        file: Option<EvidenceFile>,
        kind: EvidenceKind,
        location: Option<&str>,
    ) -> Result<Submission, SubmissionError> {
        let Some(payload) = build_payload(file, kind, location, &self.policy)? else {
            tracing::debug!(%kind, "No evidence file selected, nothing submitted");
            return Ok(Submission::Skipped);
        };

        let run_id = RunId::new();
        let (admitted_tx, admitted_rx) = oneshot::channel();
        let core = Arc::clone(self);
        tokio::spawn(async move {
            let admitted = core.admit(run_id, payload).await;
            // The caller may have gone away; an admitted run continues regardless.
            let _ = admitted_tx.send(admitted);
        });

        let handle = admitted_rx.await.map_err(|_| SubmissionError::StoreClosed)??;
        Ok(Submission::Started { run_id, handle })
    }

    /// Commit `BeginRun` and spawn the pipeline.
    ///
    /// The active slot stays locked until the token is recorded, so a
    /// cancel request never sees a busy store with no token to fire.
    async fn admit(
        self: Arc<Self>,
        run_id: RunId,
        payload: EvidencePayload,
    ) -> Result<JoinHandle<RunReport>, SubmissionError> {
        let mut slot = self.active.lock().await;
        match self.store.apply(ViewAction::BeginRun { run_id }).await? {
            Reduction::Applied => {}
            Reduction::Rejected(RejectReason::Busy { active }) => {
                tracing::info!(%active, "Submission refused, a run is in progress");
                return Err(SubmissionError::Busy { active });
            }
            Reduction::Rejected(reason) => return Err(SubmissionError::Refused(reason)),
        }

        let cancel = CancellationToken::new();
        *slot = Some((run_id, cancel.clone()));
        drop(slot);

        tracing::info!(%run_id, evidence = ?payload.summary(), "Evidence submitted");

        let core = self;
        Ok(tokio::spawn(async move {
            let report = core.orchestrator.run(run_id, cancel, payload).await;
            core.release(run_id).await;
            report
        }))
    }

    /// Cancel the run in flight. Returns its id, or `None` when idle.
    pub async fn cancel_active_run(&self) -> Option<RunId> {
        let guard = self.active.lock().await;
        let (run_id, token) = guard.as_ref()?;
        token.cancel();
        tracing::info!(%run_id, "Run cancellation requested");
        Some(*run_id)
    }

    pub async fn active_run(&self) -> Option<RunId> {
        self.active.lock().await.as_ref().map(|(run_id, _)| *run_id)
    }

    async fn release(&self, run_id: RunId) {
        let mut guard = self.active.lock().await;
        if guard.as_ref().is_some_and(|(active, _)| *active == run_id) {
            *guard = None;
        }
    }
}

/// Result of a submission request.
#[derive(Debug)]
pub enum Submission {
    /// No file was chosen.
    Skipped,
    Started {
        run_id: RunId,
        handle: JoinHandle<RunReport>,
    },
}

impl Submission {
    pub fn run_id(&self) -> Option<RunId> {
        match self {
            Self::Skipped => None,
            Self::Started { run_id, .. } => Some(*run_id),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Analysis client setup failed: {0}")]
    Services(#[from] ServiceError),
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Evidence file is empty")]
    EmptyFile,
    #[error("Evidence file is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
    #[error("Run {active} is still in progress")]
    Busy { active: RunId },
    #[error("Run refused: {0}")]
    Refused(RejectReason),
    #[error("View-state store is closed")]
    StoreClosed,
}

impl From<EvidenceError> for SubmissionError {
    fn from(err: EvidenceError) -> Self {
        match err {
            EvidenceError::EmptyFile => Self::EmptyFile,
            EvidenceError::TooLarge { size, limit } => Self::TooLarge { size, limit },
        }
    }
}

impl From<StoreClosed> for SubmissionError {
    fn from(_: StoreClosed) -> Self {
        Self::StoreClosed
    }
}
