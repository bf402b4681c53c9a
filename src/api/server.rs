//! Console server lifecycle: bind, spawn the axum server in a background
//! task, return a handle with a shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::console_router;
use crate::core_state::CoreState;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind console server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("Failed to get server address: {0}")]
    LocalAddr(std::io::Error),
}

/// Handle to a running console server.
pub struct ConsoleServer {
    pub addr: SocketAddr,
    pub started_at: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ConsoleServer {
    /// Ask the server to stop accepting connections.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("Console server shutdown signal sent");
        }
    }

    /// Wait for the server task to exit.
    pub async fn stopped(self) {
        if let Err(e) = self.task.await {
            tracing::error!("Console server task failed: {e}");
        }
    }
}

/// Start the console server on `addr`. Port 0 picks an ephemeral port.
pub async fn start_console_server(
    core: Arc<CoreState>,
    addr: SocketAddr,
) -> Result<ConsoleServer, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

    let app = console_router(core);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("Console server received shutdown signal");
        };

        tracing::info!(%addr, "Console server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("Console server error: {e}");
        }

        tracing::info!("Console server stopped");
    });

    Ok(ConsoleServer {
        addr,
        started_at: chrono::Utc::now().to_rfc3339(),
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use futures_util::StreamExt;
    use serde_json::Value;
    use tokio_tungstenite::tungstenite::{self, Message as WsMessage};

    use crate::config::AppConfig;
    use crate::evidence::EvidenceFile;
    use crate::models::EvidenceKind;
    use crate::pipeline::PipelineStage;
    use crate::services::MockAnalysisServices;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    fn core_with(mock: MockAnalysisServices) -> Arc<CoreState> {
        Arc::new(CoreState::new(AppConfig::default(), Arc::new(mock)))
    }

    async fn next_json<S>(stream: &mut S) -> Value
    where
        S: futures_util::Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("timed out waiting for message")
                .expect("stream ended")
                .expect("websocket error");
            if let WsMessage::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn start_and_stop_server() {
        let mut server = start_console_server(core_with(MockAnalysisServices::new()), loopback())
            .await
            .expect("server should start");
        assert!(server.addr.port() > 0);
        assert!(!server.started_at.is_empty());

        let url = format!("http://{}/api/health", server.addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert!(resp.status().is_success());

        server.shutdown();
        tokio::time::timeout(Duration::from_secs(5), server.stopped())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let first = start_console_server(core_with(MockAnalysisServices::new()), loopback())
            .await
            .unwrap();
        let err = start_console_server(core_with(MockAnalysisServices::new()), first.addr)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
    }

    #[tokio::test]
    async fn state_stream_follows_a_run() {
        let core = core_with(MockAnalysisServices::new());
        let server = start_console_server(core.clone(), loopback()).await.unwrap();

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/state", server.addr))
            .await
            .unwrap();

        let first = next_json(&mut ws).await;
        assert_eq!(first["type"], "snapshot");
        assert_eq!(first["state"]["busy"], false);

        core.submit_evidence(
            Some(EvidenceFile::new(Some("dock.mp3".into()), vec![1, 2, 3])),
            EvidenceKind::Audio,
            None,
        )
        .await
        .unwrap();

        // Watch snapshots coalesce, so wait for the settled state
        loop {
            let msg = next_json(&mut ws).await;
            assert_eq!(msg["type"], "snapshot");
            let state = &msg["state"];
            if state["busy"] == false && state["explanation"].is_object() {
                assert_eq!(state["intel_log"].as_array().unwrap().len(), 1);
                assert_eq!(state["risk"]["level"], "CRITICAL");
                break;
            }
        }
    }

    #[tokio::test]
    async fn state_stream_reports_failure() {
        let core = core_with(MockAnalysisServices::new().failing_at(PipelineStage::Risk));
        let server = start_console_server(core.clone(), loopback()).await.unwrap();

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/state", server.addr))
            .await
            .unwrap();
        next_json(&mut ws).await;

        core.submit_evidence(
            Some(EvidenceFile::new(Some("dock.mp3".into()), vec![1, 2, 3])),
            EvidenceKind::Audio,
            None,
        )
        .await
        .unwrap();

        // The failure message and the idle snapshot may arrive in either order
        let mut failure_seen = false;
        let mut idle_seen = false;
        while !(failure_seen && idle_seen) {
            let msg = next_json(&mut ws).await;
            if msg["type"] == "failure" {
                assert!(!failure_seen, "only one failure notice per run");
                assert_eq!(msg["notice"]["stage"], "risk");
                failure_seen = true;
            } else if msg["state"]["busy"] == false {
                idle_seen = true;
            }
        }
        assert!(core.snapshot().risk.is_none());
    }
}
