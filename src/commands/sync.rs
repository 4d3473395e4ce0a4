//! Sync command - Rebuild document collections from the database.

use std::sync::Arc;

use super::connection_error;
use crate::cli::args::SyncArgs;
use crate::config::{Config, DOCUMENT_STORE_MEMORY};
use crate::errors::{AppError, AppResult};
use crate::infra::{open_document_store, Database, Persistence};
use crate::services::{SyncService, Synchronizer};

/// Execute the sync command
pub async fn execute(args: SyncArgs, config: Config) -> AppResult<()> {
    if config.document_store_url == DOCUMENT_STORE_MEMORY {
        return Err(AppError::bad_request(
            "DOCUMENT_STORE_URL is 'memory'; there is no shared store to rebuild",
        ));
    }

    let db = Database::connect_without_migrations(&config)
        .await
        .map_err(connection_error("Database"))?;
    let documents = open_document_store(&config.document_store_url)
        .await
        .map_err(connection_error("Document store"))?;

    let uow = Arc::new(Persistence::new(db.get_connection()));
    let synchronizer = Synchronizer::new(uow, documents);
    let reports = synchronizer.sync(&args.collections).await?;

    for report in reports {
        println!(
            "{}: {} written, {} removed",
            report.collection, report.written, report.removed
        );
    }

    Ok(())
}
