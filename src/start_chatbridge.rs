//! Startup helpers for the chatbridge server.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::llm::ollama::OllamaResponder;
use crate::server::{self, AppState};
use crate::sync::actors::ActorContext;
use crate::sync::core::config::SyncConfig;
use crate::sync::store::adapter::StoreAdapter;
use crate::sync::store::sqlite_store::SqliteStore;

/// Environment variable overriding the Ollama base URL.
pub const ENV_OLLAMA_URL: &str = "CHATBRIDGE_OLLAMA_URL";
/// Environment variable overriding the completion model.
pub const ENV_MODEL: &str = "CHATBRIDGE_MODEL";
/// Environment variable overriding the `SQLite` path.
pub const ENV_DB: &str = "CHATBRIDGE_DB";
/// Environment variable overriding the HTTP port.
pub const ENV_PORT: &str = "CHATBRIDGE_PORT";

/// Run the server (used by the `chatbridge-server` binary).
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

    tracing::info!("Starting chatbridge v{}", env!("CARGO_PKG_VERSION"));

    let config = apply_env_overrides(SyncConfig::default(), |name| std::env::var(name).ok());
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {e}");
        return ExitCode::from(1);
    }
    tracing::info!("Ollama endpoint: {}", config.responder.base_url);

    let port = get_port();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let result = rt.block_on(async move {
        let state = initialize(config).await?;
        state.start_crm_poller();
        state.start_reaper();
        server::run_server_with_shutdown(state, port, shutdown_signal()).await
    });

    if let Err(e) = result {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Open the store and responder and build the application state.
///
/// # Errors
/// Returns an error if the database cannot be opened or the configuration is
/// invalid.
pub async fn initialize(
    config: SyncConfig,
) -> Result<Arc<AppState>, Box<dyn std::error::Error + Send + Sync>> {
    let store = SqliteStore::open(&config.storage).await?;
    tracing::info!("Shared store: {}", config.storage.sqlite_path.display());

    let responder = OllamaResponder::new(&config.responder, config.prompt.max_chars)?;
    if responder.is_ready().await {
        tracing::info!("Ollama is reachable");
    } else {
        tracing::warn!("Ollama is not reachable yet, visitors get the apology until it is");
    }

    let ctx = ActorContext::new(
        StoreAdapter::new(Arc::new(store)),
        Arc::new(responder),
        config,
    )?;
    AppState::new(ctx).map_err(Into::into)
}

/// Overlay `CHATBRIDGE_*` variables returned by `lookup` onto `config`.
#[must_use]
pub fn apply_env_overrides<F>(mut config: SyncConfig, lookup: F) -> SyncConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_OLLAMA_URL) {
        config.responder.base_url = url;
    }
    if let Some(model) = lookup(ENV_MODEL) {
        config.responder.model = model;
    }
    if let Some(path) = lookup(ENV_DB) {
        config.storage.sqlite_path = PathBuf::from(path);
    }
    config
}

/// Get configured server port.
#[must_use]
pub fn get_port() -> u16 {
    parse_port(std::env::var(ENV_PORT).ok().as_deref())
}

fn parse_port(raw: Option<&str>) -> u16 {
    raw.and_then(|p| p.parse().ok())
        .unwrap_or(server::DEFAULT_PORT)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
