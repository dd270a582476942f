use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use suluk_api::config::Config;
use suluk_api::db::Database;
use suluk_api::handlers::AppState;
use suluk_api::ollama_client::OllamaClient;
use suluk_api::routes::build_router;
use suluk_api::store::PgStore;

/// Main entry point for the application.
///
/// Initializes logging, loads configuration, connects to the database, makes
/// sure the schema exists, builds the inference client and serves the router.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "suluk_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");
    db.ensure_schema().await?;

    let ollama = OllamaClient::from_config(&config)?;
    tracing::info!(
        "✓ Ollama client initialized: {} (default model {})",
        config.ollama_base_url,
        config.ollama_default_model
    );

    // Build application state
    let app_state = Arc::new(AppState {
        store: Arc::new(PgStore::new(db.pool.clone())),
        config: config.clone(),
        ollama,
    });

    let app = build_router(app_state, true)?;

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
