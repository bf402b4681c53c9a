//! The task that owns the view-state.
//!
//! Writes arrive over one mpsc channel and are applied in order through
//! `reduce`. Readers get snapshots from a watch channel; failure notices
//! fan out over broadcast once their `FinishRun` is applied.

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::action::{FailureNotice, RunOutcome, ViewAction};
use super::reducer::{reduce, Reduction, RejectReason};
use super::state::ViewState;

/// Pending writes before `apply` starts waiting.
const ACTION_QUEUE_CAPACITY: usize = 64;

/// Failure notices kept for slow subscribers.
const NOTICE_CAPACITY: usize = 32;

/// The store task has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("View-state store is closed")]
pub struct StoreClosed;

struct Command {
    action: ViewAction,
    reply: oneshot::Sender<Reduction>,
}

// ═══════════════════════════════════════════════════════════
// ViewStoreHandle
// ═══════════════════════════════════════════════════════════

/// Cheap, cloneable access to the view-state store.
///
/// Writes are serialized through one channel into the task spawned by
/// `spawn()`; reads never block writers.
#[derive(Clone)]
pub struct ViewStoreHandle {
    tx: mpsc::Sender<Command>,
    snapshot: watch::Receiver<ViewState>,
    notices: broadcast::Sender<FailureNotice>,
}

impl ViewStoreHandle {
    /// Spawn the store task on the current tokio runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(ACTION_QUEUE_CAPACITY);
        let (snapshot_tx, snapshot) = watch::channel(ViewState::default());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        tokio::spawn(run_store(rx, snapshot_tx, notices.clone()));

        Self {
            tx,
            snapshot,
            notices,
        }
    }

    /// Send one write and wait until the store has applied or refused it.
    pub async fn apply(&self, action: ViewAction) -> Result<Reduction, StoreClosed> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Command { action, reply })
            .await
            .map_err(|_| StoreClosed)?;
        response.await.map_err(|_| StoreClosed)
    }

    /// Current state (cloned).
    pub fn snapshot(&self) -> ViewState {
        self.snapshot.borrow().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.snapshot.borrow().busy
    }

    /// Receiver notified after every applied write.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.snapshot.clone()
    }

    /// Receiver for failure notices published from now on.
    pub fn notices(&self) -> broadcast::Receiver<FailureNotice> {
        self.notices.subscribe()
    }
}

async fn run_store(
    mut rx: mpsc::Receiver<Command>,
    snapshot_tx: watch::Sender<ViewState>,
    notices: broadcast::Sender<FailureNotice>,
) {
    let mut state = ViewState::default();

    while let Some(Command { action, reply }) = rx.recv().await {
        let run_id = action.run_id();
        let name = action.name();
        let notice = match &action {
            ViewAction::FinishRun {
                outcome: RunOutcome::Failed(notice),
                ..
            } => Some(notice.clone()),
            _ => None,
        };

        let reduction = reduce(&mut state, action);
        match &reduction {
            Reduction::Applied => {
                snapshot_tx.send_replace(state.clone());
                if let Some(notice) = notice {
                    // No subscribers is fine; the notice was already logged.
                    let _ = notices.send(notice);
                }
                tracing::trace!(
                    %run_id,
                    action = name,
                    version = state.version,
                    "View-state updated"
                );
            }
            Reduction::Rejected(reason @ RejectReason::Busy { .. }) => {
                tracing::debug!(%run_id, action = name, %reason, "View-state write refused");
            }
            Reduction::Rejected(reason) => {
                tracing::warn!(%run_id, action = name, %reason, "View-state write discarded");
            }
        }

        let _ = reply.send(reduction);
    }

    tracing::debug!("View-state store stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RiskAssessment, RiskLevel, RunId};

    #[tokio::test]
    async fn apply_updates_snapshot() {
        let store = ViewStoreHandle::spawn();
        let run_id = RunId::new();

        let result = store.apply(ViewAction::BeginRun { run_id }).await.unwrap();
        assert_eq!(result, Reduction::Applied);
        assert!(store.is_busy());
        assert_eq!(store.snapshot().active_run, Some(run_id));
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let store = ViewStoreHandle::spawn();
        let mut rx = store.subscribe();
        let run_id = RunId::new();

        store.apply(ViewAction::BeginRun { run_id }).await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().busy);
    }

    #[tokio::test]
    async fn rejected_write_leaves_snapshot_unchanged() {
        let store = ViewStoreHandle::spawn();
        let before = store.snapshot();

        let result = store
            .apply(ViewAction::RiskAssessed {
                run_id: RunId::new(),
                risk: RiskAssessment::new(RiskLevel::High, 0.5),
            })
            .await
            .unwrap();
        assert!(!result.is_applied());
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn failed_finish_publishes_one_notice() {
        let store = ViewStoreHandle::spawn();
        let mut notices = store.notices();
        let run_id = RunId::new();
        store.apply(ViewAction::BeginRun { run_id }).await.unwrap();

        let notice = FailureNotice::new(run_id, None, "memory service down");
        let finish = ViewAction::FinishRun {
            run_id,
            outcome: RunOutcome::Failed(notice.clone()),
        };
        store.apply(finish.clone()).await.unwrap();
        // A duplicate finish is refused and must not notify again
        store.apply(finish).await.unwrap();

        assert_eq!(notices.recv().await.unwrap(), notice);
        assert!(matches!(
            notices.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        assert!(!store.is_busy());
    }

    #[tokio::test]
    async fn clones_share_one_state() {
        let store = ViewStoreHandle::spawn();
        let other = store.clone();
        other
            .apply(ViewAction::BeginRun { run_id: RunId::new() })
            .await
            .unwrap();
        assert!(store.is_busy());
    }
}
