use katago_session::{AnalysisSession, KataGoEngine};
use server::{config, routes};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;

    // A missing or broken engine is fatal at startup
    tracing::info!(path = %config.session.katago_path, "Starting KataGo...");
    let engine = KataGoEngine::from_config(&config.session)?;
    let session = AnalysisSession::new(config.session.clone(), engine)?;

    let app = routes::router(session.clone());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await?;

    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close engine input: {e}");
    }
    Ok(())
}
