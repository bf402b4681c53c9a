pub mod api; // Console REST + WebSocket
pub mod config;
pub mod core_state;
pub mod evidence;
pub mod models;
pub mod pipeline; // Five-stage analysis orchestrator
pub mod services; // Analysis backend boundary
pub mod view_state; // Reducer-backed dashboard state

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Startup failures surfaced to `main`.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Core(#[from] core_state::CoreError),
    #[error(transparent)]
    Server(#[from] api::ServerError),
}

/// Run the console until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let app_config = config::AppConfig::from_env()?;
    let bind_addr = app_config.bind_addr;
    let core = Arc::new(core_state::CoreState::from_config(app_config)?);

    match core.backend_health().await {
        Ok(health) => tracing::info!(status = %health.status, "Analysis backend reachable"),
        Err(e) => tracing::warn!(error = %e, "Analysis backend not reachable yet"),
    }

    let mut server = api::start_console_server(core.clone(), bind_addr).await?;
    tracing::info!(addr = %server.addr, "Dashboard console listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
    }

    if let Some(run_id) = core.cancel_active_run().await {
        tracing::info!(%run_id, "Cancelling run in progress before exit");
    }
    server.shutdown();
    server.stopped().await;

    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
