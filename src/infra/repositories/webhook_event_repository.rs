use async_trait::async_trait;
use sea_orm::{
    sea_query::OnConflict, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set,
    ColumnTrait,
};

use super::entities::webhook_event::{self, Entity as WebhookEventEntity};
use crate::errors::AppResult;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Ledger of processed payment provider events
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn is_processed(&self, event_id: &str) -> AppResult<bool>;

    /// Record an event as processed; recording twice is a no-op
    async fn record(&self, provider: &str, event_id: &str, event_type: &str) -> AppResult<()>;
}

pub struct WebhookEventStore {
    db: DatabaseConnection,
}

impl WebhookEventStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WebhookEventRepository for WebhookEventStore {
    async fn is_processed(&self, event_id: &str) -> AppResult<bool> {
        let count = WebhookEventEntity::find()
            .filter(webhook_event::Column::EventId.eq(event_id))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn record(&self, provider: &str, event_id: &str, event_type: &str) -> AppResult<()> {
        let active = webhook_event::ActiveModel {
            event_id: Set(event_id.to_string()),
            provider: Set(provider.to_string()),
            event_type: Set(event_type.to_string()),
            processed_at: Set(chrono::Utc::now()),
        };

        WebhookEventEntity::insert(active)
            .on_conflict(
                OnConflict::column(webhook_event::Column::EventId)
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
