use std::sync::Arc;

use reachmail::config::AppConfig;
use reachmail::http::{AppState, api_routes};
use reachmail::llm::{EmailClassifier, GeminiClient, GenerativeModel, ReplyGenerator};
use reachmail::notify::SlackNotifier;
use reachmail::store::{EmailStore, LibSqlStore};
use reachmail::sync::{ImapTlsConnector, SyncOrchestrator, SyncRegistry, SyncSettings};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export GOOGLE_API_KEY=...");
        std::process::exit(1);
    });

    eprintln!("📬 ReachMail v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   API: http://{}/", config.bind);
    eprintln!("   Database: {}", config.db_path);

    let store: Arc<dyn EmailStore> = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&config.db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {e}", config.db_path);
                std::process::exit(1);
            }),
    );

    let model: Arc<dyn GenerativeModel> = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        config.model.clone(),
    )?);
    let classifier = Arc::new(EmailClassifier::new(Arc::clone(&model)));
    let generator = Arc::new(ReplyGenerator::new(Arc::clone(&model)));
    let notifier = Arc::new(SlackNotifier::new(config.slack_webhook_url.clone())?);

    let registry = SyncRegistry::new();
    let orchestrator = Arc::new(SyncOrchestrator::new(
        Arc::clone(&store),
        Arc::new(ImapTlsConnector),
        classifier,
        notifier,
        SyncSettings {
            lookback_days: config.lookback_days,
            message_cap: config.message_cap,
        },
    ));

    let state = AppState {
        store,
        registry: Arc::clone(&registry),
        orchestrator,
        generator,
        user_name: config.user_name.clone(),
        booking_link: config.booking_link.clone(),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!(bind = %config.bind, "HTTP API listening");

    axum::serve(listener, api_routes(state))
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&registry)))
        .await?;

    // Passes observe the flag between messages and drain on their own.
    registry.shutdown();
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal(registry: Arc<SyncRegistry>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Ctrl-C received, shutting down");
        registry.shutdown();
    }
}
