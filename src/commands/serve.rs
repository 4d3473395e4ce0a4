//! Serve command - Starts the HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use super::connection_error;
use crate::api::{create_router, AppState};
use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::infra::{open_document_store, Cache, Database};

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: Config) -> AppResult<()> {
    tracing::info!("Starting server...");

    // Initialize database (applies pending migrations)
    let db = Database::connect(&config)
        .await
        .map_err(connection_error("Database"))?;
    let db = Arc::new(db);
    tracing::info!("Database connected");

    // Initialize Redis cache
    let cache = Cache::connect(&config.redis_url)
        .await
        .map_err(connection_error("Redis"))?;
    let cache = Arc::new(cache);

    let documents = open_document_store(&config.document_store_url)
        .await
        .map_err(connection_error("Document store"))?;

    let app_state = AppState::from_config(db, cache, documents, config);

    // Build router
    let app = create_router(app_state);

    // Start server
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("Server running on http://{}", addr);

    // Client addresses feed the rate limiter when no proxy header is set
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    Ok(())
}
