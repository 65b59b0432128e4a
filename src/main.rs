/// Optima admin backend
///
/// Moderation and audit service for the Optima social-content store.
use optima_admin::{config::ServerConfig, context::AppContext, error::AdminResult, server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> AdminResult<()> {
    // Load configuration (reads .env first so RUST_LOG applies)
    let config = ServerConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "optima_admin=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Optima admin backend v{} starting",
        config.service.version
    );

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Start server
    let result = server::serve(ctx.clone()).await;

    ctx.shutdown().await;

    result
}
