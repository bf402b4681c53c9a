//! Drives one analysis run through the five stages.
//!
//! Stages run strictly in sequence with no retry. Each stage result that
//! the view-state cares about is committed as soon as it arrives, so a
//! failure at stage k leaves the writes of stages 1..k-1 visible. Every
//! run ends with exactly one `FinishRun`, which clears busy and carries
//! the failure notice when there is one.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use super::error::PipelineError;
use super::types::{PipelineConfig, PipelineStage, RunReport};
use crate::evidence::EvidencePayload;
use crate::models::{IntelItem, RunId};
use crate::services::{AnalysisServices, ServiceError};
use crate::view_state::{FailureNotice, Reduction, RunOutcome, ViewAction, ViewStoreHandle};

pub struct PipelineOrchestrator {
    services: Arc<dyn AnalysisServices>,
    store: ViewStoreHandle,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    pub fn new(
        services: Arc<dyn AnalysisServices>,
        store: ViewStoreHandle,
        config: PipelineConfig,
    ) -> Self {
        Self {
            services,
            store,
            config,
        }
    }

    pub fn store(&self) -> &ViewStoreHandle {
        &self.store
    }

    /// Run all stages for an admitted run.
    ///
    /// The caller must already have applied `BeginRun` for `run_id`; this
    /// method always ends the run with `FinishRun`.
    pub async fn run(
        &self,
        run_id: RunId,
        cancel: CancellationToken,
        evidence: EvidencePayload,
    ) -> RunReport {
        let started = Instant::now();
        let mut completed = Vec::with_capacity(PipelineStage::ALL.len());

        tracing::info!(
            %run_id,
            kind = %evidence.kind,
            location = %evidence.location,
            size_bytes = evidence.bytes.len(),
            "Pipeline run started"
        );

        let result = self
            .execute(run_id, &cancel, &evidence, &mut completed)
            .await;

        let outcome = match &result {
            Ok(()) => RunOutcome::Completed,
            Err(e) => {
                if e.is_cancelled() {
                    tracing::warn!(%run_id, stage = ?e.stage(), "Pipeline run cancelled");
                } else {
                    tracing::error!(
                        %run_id,
                        stage = ?e.stage(),
                        error = %e,
                        "Pipeline run failed"
                    );
                }
                RunOutcome::Failed(FailureNotice::new(run_id, e.stage(), e.to_string()))
            }
        };

        match self.store.apply(ViewAction::FinishRun { run_id, outcome }).await {
            Ok(Reduction::Applied) => {}
            Ok(Reduction::Rejected(reason)) => {
                tracing::warn!(%run_id, %reason, "Run finish was not recorded");
            }
            Err(e) => {
                tracing::error!(%run_id, error = %e, "Run finish was not recorded");
            }
        }

        let elapsed = started.elapsed();
        if result.is_ok() {
            tracing::info!(
                %run_id,
                elapsed_ms = elapsed.as_millis() as u64,
                "Pipeline run completed"
            );
        }

        RunReport {
            run_id,
            completed,
            error: result.err(),
            elapsed,
        }
    }

    async fn execute(
        &self,
        run_id: RunId,
        cancel: &CancellationToken,
        evidence: &EvidencePayload,
        completed: &mut Vec<PipelineStage>,
    ) -> Result<(), PipelineError> {
        let services = self.services.as_ref();

        // 1. Ingest
        let ingested = self
            .stage(run_id, PipelineStage::Ingest, cancel, services.ingest(evidence))
            .await?;
        let description = ingested.description.clone();
        let item = IntelItem::new(
            ingested.id,
            evidence.kind,
            ingested.description,
            evidence.location.clone(),
            run_id,
        );
        self.commit(PipelineStage::Ingest, ViewAction::IntelIngested { run_id, item })
            .await?;
        completed.push(PipelineStage::Ingest);

        // 2. Memory lookup, threaded through and never stored
        let incidents = self
            .stage(run_id, PipelineStage::Memory, cancel, services.recall(&description))
            .await?;
        tracing::debug!(%run_id, matches = incidents.len(), "Similar incidents recalled");
        completed.push(PipelineStage::Memory);

        // 3. Risk
        let risk = self
            .stage(run_id, PipelineStage::Risk, cancel, services.assess_risk(&incidents))
            .await?;
        self.commit(
            PipelineStage::Risk,
            ViewAction::RiskAssessed {
                run_id,
                risk: risk.clone(),
            },
        )
        .await?;
        completed.push(PipelineStage::Risk);

        // 4. Decision
        let plan = self
            .stage(
                run_id,
                PipelineStage::Decision,
                cancel,
                services.plan(&description, &risk, &incidents),
            )
            .await?;
        self.commit(
            PipelineStage::Decision,
            ViewAction::PlanGenerated {
                run_id,
                plan: plan.clone(),
            },
        )
        .await?;
        completed.push(PipelineStage::Decision);

        // 5. Explain
        let explanation = self
            .stage(
                run_id,
                PipelineStage::Explain,
                cancel,
                services.explain(&plan, &risk, &incidents),
            )
            .await?;
        self.commit(
            PipelineStage::Explain,
            ViewAction::ExplanationReady {
                run_id,
                explanation,
            },
        )
        .await?;
        completed.push(PipelineStage::Explain);

        Ok(())
    }

    /// Await one service call under the stage timeout and the run's token.
    async fn stage<T, F>(
        &self,
        run_id: RunId,
        stage: PipelineStage,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        let started = Instant::now();
        tracing::debug!(%run_id, %stage, "Stage started");

        let bounded = async {
            match self.config.stage_timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => {
                        result.map_err(|source| PipelineError::StageFailed { stage, source })
                    }
                    Err(_) => Err(PipelineError::StageTimedOut {
                        stage,
                        timeout: limit,
                    }),
                },
                None => call
                    .await
                    .map_err(|source| PipelineError::StageFailed { stage, source }),
            }
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled { stage }),
            result = bounded => result,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::info!(%run_id, %stage, elapsed_ms, "Stage completed"),
            Err(e) => tracing::debug!(%run_id, %stage, elapsed_ms, error = %e, "Stage stopped"),
        }
        result
    }

    async fn commit(&self, stage: PipelineStage, action: ViewAction) -> Result<(), PipelineError> {
        match self.store.apply(action).await? {
            Reduction::Applied => Ok(()),
            Reduction::Rejected(reason) => Err(PipelineError::WriteRejected { stage, reason }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{EvidenceKind, RiskAssessment, RiskLevel};
    use crate::services::MockAnalysisServices;

    fn audio() -> EvidencePayload {
        EvidencePayload {
            kind: EvidenceKind::Audio,
            location: "Sector 4".into(),
            file_name: "dock.mp3".into(),
            mime: "audio/mpeg".into(),
            bytes: vec![0x49, 0x44, 0x33, 0x04],
        }
    }

    fn setup(
        mock: MockAnalysisServices,
        config: PipelineConfig,
    ) -> (Arc<MockAnalysisServices>, PipelineOrchestrator) {
        let mock = Arc::new(mock);
        let orchestrator =
            PipelineOrchestrator::new(mock.clone(), ViewStoreHandle::spawn(), config);
        (mock, orchestrator)
    }

    async fn submit(orchestrator: &PipelineOrchestrator, evidence: EvidencePayload) -> RunReport {
        let run_id = RunId::new();
        let begun = orchestrator
            .store()
            .apply(ViewAction::BeginRun { run_id })
            .await
            .unwrap();
        assert!(begun.is_applied());
        orchestrator
            .run(run_id, CancellationToken::new(), evidence)
            .await
    }

    #[tokio::test]
    async fn gunshot_scenario_fills_dashboard() {
        let (mock, orchestrator) = setup(MockAnalysisServices::new(), PipelineConfig::default());

        let report = submit(&orchestrator, audio()).await;
        assert!(report.is_success());
        assert_eq!(report.completed, PipelineStage::ALL.to_vec());
        assert_eq!(mock.calls(), PipelineStage::ALL.to_vec());

        let state = orchestrator.store().snapshot();
        assert!(!state.busy);
        assert_eq!(state.intel_log.len(), 1);
        let item = &state.intel_log[0];
        assert_eq!(item.id, "x1");
        assert_eq!(item.kind, EvidenceKind::Audio);
        assert_eq!(item.description, "Gunshot heard near loading dock");
        assert_eq!(item.run_id, report.run_id);

        let risk = state.risk.unwrap();
        assert_eq!(risk.level, RiskLevel::Critical);
        assert!((risk.score - 0.95).abs() < f64::EPSILON);
        assert_eq!(
            state.plan.unwrap().immediate_actions,
            vec!["Evacuate Sector 4".to_string(), "Cut Power Grid B".to_string()]
        );
        assert!(!state.explanation.unwrap().narrative.is_empty());
    }

    #[tokio::test]
    async fn plan_and_explanation_use_this_runs_risk() {
        let risk = RiskAssessment::new(RiskLevel::Medium, 0.4);
        let (mock, orchestrator) = setup(
            MockAnalysisServices::new().with_risk(risk.clone()),
            PipelineConfig::default(),
        );

        submit(&orchestrator, audio()).await;

        assert_eq!(mock.plan_inputs(), vec![risk.clone()]);
        let explained = mock.explain_inputs();
        assert_eq!(explained.len(), 1);
        assert_eq!(explained[0].1, risk);
        assert_eq!(Some(explained[0].0.clone()), orchestrator.store().snapshot().plan);
    }

    #[tokio::test]
    async fn empty_history_still_reaches_explanation() {
        let (mock, orchestrator) = setup(
            MockAnalysisServices::new()
                .with_incidents(Vec::new())
                .with_risk(RiskAssessment::new(RiskLevel::Unknown, 0.0)),
            PipelineConfig::default(),
        );

        let report = submit(&orchestrator, audio()).await;
        assert!(report.is_success());
        assert_eq!(mock.calls(), PipelineStage::ALL.to_vec());

        let state = orchestrator.store().snapshot();
        assert_eq!(state.risk.unwrap().level, RiskLevel::Unknown);
        assert!(state.plan.is_some());
        assert!(state.explanation.is_some());
        assert_eq!(mock.plan_inputs()[0].level, RiskLevel::Unknown);
    }

    #[tokio::test]
    async fn failure_at_each_stage_keeps_earlier_writes() {
        for (k, failing) in PipelineStage::ALL.into_iter().enumerate() {
            let (mock, orchestrator) = setup(
                MockAnalysisServices::new().failing_at(failing),
                PipelineConfig::default(),
            );
            let mut notices = orchestrator.store().notices();

            let report = submit(&orchestrator, audio()).await;

            assert_eq!(report.failed_stage(), Some(failing));
            assert!(matches!(
                report.error,
                Some(PipelineError::StageFailed { .. })
            ));
            assert_eq!(report.completed, PipelineStage::ALL[..k].to_vec());
            // Later stages are never called
            assert_eq!(mock.calls(), PipelineStage::ALL[..=k].to_vec());

            let state = orchestrator.store().snapshot();
            assert!(!state.busy, "busy must clear when {failing} fails");
            assert_eq!(state.intel_log.len(), usize::from(k > 0));
            assert_eq!(state.risk.is_some(), k > 2);
            assert_eq!(state.plan.is_some(), k > 3);
            assert!(state.explanation.is_none());

            let notice = notices.recv().await.unwrap();
            assert_eq!(notice.stage, Some(failing));
            assert_eq!(notice.run_id, report.run_id);
            assert!(notices.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn risk_failure_scenario() {
        let (_, orchestrator) = setup(
            MockAnalysisServices::new().failing_at(PipelineStage::Risk),
            PipelineConfig::default(),
        );
        let report = submit(&orchestrator, audio()).await;
        assert!(!report.is_success());

        let state = orchestrator.store().snapshot();
        assert_eq!(state.intel_log.len(), 1);
        assert!(state.risk.is_none());
        assert!(state.plan.is_none());
        assert!(state.explanation.is_none());
        assert!(!state.busy);
    }

    #[tokio::test]
    async fn hung_stage_times_out() {
        let (mock, orchestrator) = setup(
            MockAnalysisServices::new().with_delay(PipelineStage::Memory, Duration::from_secs(30)),
            PipelineConfig {
                stage_timeout: Some(Duration::from_millis(50)),
            },
        );

        let report = submit(&orchestrator, audio()).await;

        assert!(matches!(
            report.error,
            Some(PipelineError::StageTimedOut {
                stage: PipelineStage::Memory,
                ..
            })
        ));
        assert_eq!(mock.calls(), vec![PipelineStage::Ingest, PipelineStage::Memory]);
        let state = orchestrator.store().snapshot();
        assert_eq!(state.intel_log.len(), 1);
        assert!(!state.busy);
    }

    #[tokio::test]
    async fn cancelled_run_stops_in_flight_stage() {
        let (mock, orchestrator) = setup(
            MockAnalysisServices::new().with_delay(PipelineStage::Risk, Duration::from_secs(30)),
            PipelineConfig::default(),
        );
        let orchestrator = Arc::new(orchestrator);
        let run_id = RunId::new();
        orchestrator
            .store()
            .apply(ViewAction::BeginRun { run_id })
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let task = {
            let orchestrator = orchestrator.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { orchestrator.run(run_id, cancel, audio()).await })
        };

        while !mock.calls().contains(&PipelineStage::Risk) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();

        let report = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            report.error,
            Some(PipelineError::Cancelled {
                stage: PipelineStage::Risk
            })
        ));
        let state = orchestrator.store().snapshot();
        assert!(!state.busy);
        assert!(state.risk.is_none());
        assert_eq!(state.intel_log.len(), 1);
    }

    #[tokio::test]
    async fn same_file_twice_yields_two_items() {
        let (_, orchestrator) = setup(MockAnalysisServices::new(), PipelineConfig::default());

        let first = submit(&orchestrator, audio()).await;
        let second = submit(&orchestrator, audio()).await;
        assert!(first.is_success() && second.is_success());

        let state = orchestrator.store().snapshot();
        let ids: Vec<&str> = state.intel_log.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["x2", "x1"]);
        assert_eq!(state.active_run, Some(second.run_id));
    }

    #[tokio::test]
    async fn stale_run_stops_without_further_calls() {
        let (mock, orchestrator) = setup(MockAnalysisServices::new(), PipelineConfig::default());

        // Never admitted: the first write is refused
        let report = orchestrator
            .run(RunId::new(), CancellationToken::new(), audio())
            .await;

        assert!(matches!(
            report.error,
            Some(PipelineError::WriteRejected {
                stage: PipelineStage::Ingest,
                ..
            })
        ));
        assert_eq!(mock.calls(), vec![PipelineStage::Ingest]);
        assert!(orchestrator.store().snapshot().intel_log.is_empty());
    }

    #[tokio::test]
    async fn no_timeout_when_disabled() {
        let (_, orchestrator) = setup(
            MockAnalysisServices::new()
                .with_delay(PipelineStage::Explain, Duration::from_millis(80)),
            PipelineConfig {
                stage_timeout: None,
            },
        );
        let report = submit(&orchestrator, audio()).await;
        assert!(report.is_success());
    }
}
