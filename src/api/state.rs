//! Application state - Dependency injection container.
//!
//! Handlers reach every use case through the [`ServiceContainer`]; the
//! infrastructure handles are kept alongside for health checks and
//! rate limiting.

use std::sync::Arc;

use crate::config::Config;
use crate::infra::{Cache, Database, DocumentStore};
use crate::services::{ServiceContainer, Services};

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// All application services
    pub services: Arc<dyn ServiceContainer>,
    /// Redis cache (rate limiting)
    pub cache: Arc<Cache>,
    /// Database connection
    pub database: Arc<Database>,
    /// Document store mirrored by every write
    pub documents: Arc<dyn DocumentStore>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the concrete [`Services`] over the given infrastructure.
    pub fn from_config(
        database: Arc<Database>,
        cache: Arc<Cache>,
        documents: Arc<dyn DocumentStore>,
        config: Config,
    ) -> Self {
        let services = Arc::new(Services::from_connection(
            database.get_connection(),
            documents.clone(),
            config.clone(),
        ));

        Self::new(services, cache, database, documents, config)
    }

    /// Create state with an injected service container.
    pub fn new(
        services: Arc<dyn ServiceContainer>,
        cache: Arc<Cache>,
        database: Arc<Database>,
        documents: Arc<dyn DocumentStore>,
        config: Config,
    ) -> Self {
        Self {
            services,
            cache,
            database,
            documents,
            config: Arc::new(config),
        }
    }
}
