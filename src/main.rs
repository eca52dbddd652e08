use std::sync::Arc;

use fin_assist::channels::webhook::webhook_routes;
use fin_assist::config::BotConfig;
use fin_assist::dispatch::Dispatcher;
use fin_assist::gateway::CrmClient;
use fin_assist::media::MediaStore;
use fin_assist::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export FIN_ASSIST_GATEWAY_URL=https://crm.example.com/api");
        eprintln!("  export FIN_ASSIST_GATEWAY_KEY=...");
        std::process::exit(1);
    });

    eprintln!("💱 Fin Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Gateway: {}", config.gateway_base_url);
    eprintln!("   Webhook: http://{}/webhook", config.bind_addr);
    eprintln!("   Health:  http://{}/health", config.bind_addr);

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Media storage ────────────────────────────────────────────────────
    let media = Arc::new(MediaStore::new(
        config.media_dir.clone(),
        config.media_timeout,
    )?);
    eprintln!("   Media dir: {}", config.media_dir.display());

    // ── Gateway client + dispatcher ──────────────────────────────────────
    let gateway = Arc::new(CrmClient::new(
        config.gateway_base_url.clone(),
        config.gateway_api_key.clone(),
        Arc::clone(&db),
    ));
    let dispatcher = Arc::new(Dispatcher::new(db, gateway, media));

    // ── Webhook server ───────────────────────────────────────────────────
    let app = webhook_routes(dispatcher);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Webhook server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
