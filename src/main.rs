mod config;
mod db;
mod error;
mod models;
mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use config::Config;
use sqlx::SqlitePool;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across all handlers
pub struct AppState {
    pub db: SqlitePool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "game_catalog_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting game catalog backend...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Connect to database
    let db = db::create_pool(config.database_url(), config.database.max_connections)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    // Run migrations
    db::run_migrations(&db)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations completed");

    let mut conn = db.acquire().await?;
    let game_count = db::queries::count_games(&mut conn).await?;
    drop(conn);
    tracing::info!("Catalog holds {} games", game_count);

    let state = Arc::new(AppState { db });

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::create_routes()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Games API: http://{}/api/games", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
