use async_trait::async_trait;
use sea_orm::{
    sea_query::OnConflict, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    Set, TryInsertResult,
};
use uuid::Uuid;

use super::entities::cart_item::{self, Entity as CartItemEntity};
use crate::domain::CartItem;
use crate::errors::AppResult;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Items in the order they were added
    async fn list(&self, user_id: Uuid) -> AppResult<Vec<CartItem>>;

    /// Returns false when the course was already in the cart
    async fn add(&self, user_id: Uuid, course_id: Uuid) -> AppResult<bool>;

    /// Returns false when the course was not in the cart
    async fn remove(&self, user_id: Uuid, course_id: Uuid) -> AppResult<bool>;

    async fn clear(&self, user_id: Uuid) -> AppResult<u64>;
}

pub struct CartStore {
    db: DatabaseConnection,
}

impl CartStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CartRepository for CartStore {
    async fn list(&self, user_id: Uuid) -> AppResult<Vec<CartItem>> {
        let models = CartItemEntity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .order_by_asc(cart_item::Column::AddedAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(CartItem::from).collect())
    }

    async fn add(&self, user_id: Uuid, course_id: Uuid) -> AppResult<bool> {
        let active = cart_item::ActiveModel {
            user_id: Set(user_id),
            course_id: Set(course_id),
            added_at: Set(chrono::Utc::now()),
        };

        let result = CartItemEntity::insert(active)
            .on_conflict(
                OnConflict::columns([cart_item::Column::UserId, cart_item::Column::CourseId])
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec(&self.db)
            .await?;

        Ok(matches!(result, TryInsertResult::Inserted(_)))
    }

    async fn remove(&self, user_id: Uuid, course_id: Uuid) -> AppResult<bool> {
        let result = CartItemEntity::delete_by_id((user_id, course_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn clear(&self, user_id: Uuid) -> AppResult<u64> {
        let result = CartItemEntity::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
