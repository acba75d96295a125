use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use life_coach::config::CoachConfig;
use life_coach::llm::{InferenceEngine, LlamaServerEngine};
use life_coach::questionnaire::{QuestionCatalog, QuestionnaireFlow, ResponseModel};
use life_coach::server::app_router;
use life_coach::session::{CoachChat, InferenceSession};
use life_coach::store::{LibSqlStore, Store};

/// Install stderr logging, plus a daily rolling file when `log_dir` is set.
/// The returned guard must live as long as the process.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "life-coach.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CoachConfig::from_env().context("invalid configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("🧭 Life Coach v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Model: {}", config.model_path.display());
    eprintln!("   Engine: {}", config.engine_url);
    eprintln!("   Questionnaire: http://0.0.0.0:{}/api/questionnaire", config.http_port);
    eprintln!("   Chat WS: ws://0.0.0.0:{}/ws/chat\n", config.http_port);

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn Store> = Arc::new(
        LibSqlStore::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );

    // ── Questionnaire ────────────────────────────────────────────────────
    let catalog = match &config.questions_path {
        Some(path) => QuestionCatalog::load(path)
            .with_context(|| format!("failed to load questionnaire {}", path.display()))?,
        None => QuestionCatalog::bundled().context("bundled questionnaire is invalid")?,
    };
    let catalog = Arc::new(catalog);
    tracing::info!(questions = catalog.len(), "Questionnaire loaded");

    let responses = Arc::new(ResponseModel::load(Arc::clone(&store), Arc::clone(&catalog)).await);
    let flow = Arc::new(QuestionnaireFlow::new(
        catalog,
        Arc::clone(&responses),
        Arc::clone(&store),
    ));
    flow.enter().await;

    // ── Coaching session ─────────────────────────────────────────────────
    let engine: Arc<dyn InferenceEngine> = Arc::new(LlamaServerEngine::new(
        config.engine_url.clone(),
        config.max_tokens,
    ));
    let session = Arc::new(InferenceSession::new(
        engine,
        config.model_path.clone(),
        config.system_prompt.clone(),
        responses,
    ));
    let chat = Arc::new(CoachChat::new(session));
    if let Err(e) = chat.initialize().await {
        tracing::warn!(error = %e, "Model not loaded yet, retrying on first message");
    }

    // ── HTTP server ──────────────────────────────────────────────────────
    let app = app_router(flow, chat);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .with_context(|| format!("failed to bind port {}", config.http_port))?;
    tracing::info!(port = config.http_port, "Life coach server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}
