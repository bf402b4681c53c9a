//! WebSocket stream of dashboard state.
//!
//! Connection lifecycle:
//! 1. Dashboard opens `GET /ws/state`
//! 2. Server sends the current snapshot
//! 3. Every applied view-state write produces a new snapshot message
//! 4. Every failed run produces one failure message
//!
//! Incoming messages other than Close are ignored.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::api::types::ApiContext;
use crate::core_state::CoreState;
use crate::view_state::{FailureNotice, ViewState};

/// Server → dashboard message.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsOutgoing {
    Snapshot { state: ViewState },
    Failure { notice: FailureNotice },
}

/// WebSocket upgrade handler.
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(ctx): State<ApiContext>) -> impl IntoResponse {
    let core = ctx.core.clone();
    ws.on_upgrade(move |socket| handle_ws(socket, core))
}

async fn handle_ws(socket: WebSocket, core: Arc<CoreState>) {
    let (mut sink, mut stream) = socket.split();
    let mut snapshots = core.store().subscribe();
    let mut notices = core.store().notices();

    tracing::debug!("State stream connected");

    let initial = WsOutgoing::Snapshot {
        state: snapshots.borrow_and_update().clone(),
    };
    if send(&mut sink, &initial).await.is_err() {
        return;
    }

    loop {
        let outgoing = tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                WsOutgoing::Snapshot {
                    state: snapshots.borrow_and_update().clone(),
                }
            }
            notice = notices.recv() => match notice {
                Ok(notice) => WsOutgoing::Failure { notice },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "State stream lagging, failure notices dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            },
        };

        if send(&mut sink, &outgoing).await.is_err() {
            break;
        }
    }

    let _ = sink.close().await;
    tracing::debug!("State stream disconnected");
}

async fn send(sink: &mut SplitSink<WebSocket, Message>, msg: &WsOutgoing) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|e| {
        tracing::warn!(error = %e, "Failed to encode state stream message");
    })?;
    sink.send(Message::Text(json)).await.map_err(|_| ())
}
