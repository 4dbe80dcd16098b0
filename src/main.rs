use imob_lead_api::config::Config;
use imob_lead_api::db::Database;
use imob_lead_api::handlers::AppState;
use imob_lead_api::pg_store::PgStore;
use imob_lead_api::router::create_router;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes logging, configuration, the database pool and schema,
/// then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imob_lead_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool and bring the schema up
    let db = Database::new(&config.database_url).await?;
    db.ensure_schema().await?;
    tracing::info!("Database connection pool established");

    let store = Arc::new(PgStore::new(db.pool.clone()));

    // Build application state; the one store serves both as lead
    // storage and audit sink
    let app_state = Arc::new(AppState {
        store: store.clone(),
        audit: store,
        config: config.clone(),
    });

    let app = create_router(app_state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
