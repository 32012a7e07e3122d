//! Startup helpers for the MoodChat server.

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use crate::config::MoodchatConfig;
use crate::server::{self, AppState};

/// Run the server (used by the `moodchat-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting MoodChat v{}", env!("CARGO_PKG_VERSION"));

    let config = MoodchatConfig::from_env();
    tracing::info!(
        "Ollama endpoint: {}, chat model: {}, theme mode: {:?}",
        config.ollama_base_url,
        config.chat_model,
        config.theme_mode
    );
    let port = config.port;

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let state = match rt.block_on(AppState::new(config)) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to create state: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(server::run_server(state, port)) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Initialize application state without starting the server.
///
/// # Errors
/// Returns an error if state creation fails.
pub async fn initialize(
    config: MoodchatConfig,
) -> Result<Arc<AppState>, Box<dyn std::error::Error + Send + Sync>> {
    AppState::new(config).await
}

/// Run the server with graceful shutdown.
///
/// # Errors
/// Returns an error if the server fails.
pub async fn run_server_with_shutdown<F>(
    state: Arc<AppState>,
    port: u16,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    server::run_server_with_shutdown(state, port, shutdown_signal).await
}
