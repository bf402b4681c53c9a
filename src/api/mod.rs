//! Console API for the operator dashboard.
//!
//! Exposes the view-state, evidence submission and run cancellation as
//! HTTP endpoints under `/api/`, plus a WebSocket at `/ws/state` that
//! streams snapshots and failure notices.
//!
//! The router is composable: `console_router()` returns a `Router` that
//! can be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;
pub mod websocket;

pub use error::ApiError;
pub use router::console_router;
pub use server::{start_console_server, ConsoleServer, ServerError};
pub use types::ApiContext;
