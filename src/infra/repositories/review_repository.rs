use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use super::base::{conflict_on_unique, fetch_page};
use super::entities::review::{self, ActiveModel, Entity as ReviewEntity};
use crate::domain::{RatingSummary, Review};
use crate::errors::{AppError, AppResult};
use crate::types::PaginationParams;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Review>>;

    async fn find_by_author(&self, user_id: Uuid, course_id: Uuid) -> AppResult<Option<Review>>;

    /// Reviews of a course, newest first
    async fn list_by_course(
        &self,
        course_id: Uuid,
        params: PaginationParams,
    ) -> AppResult<(Vec<Review>, u64)>;

    async fn summary(&self, course_id: Uuid) -> AppResult<RatingSummary>;

    async fn list_all(&self) -> AppResult<Vec<Review>>;

    /// One review per (user, course); a second one is a `Conflict`.
    async fn insert(&self, review: Review) -> AppResult<Review>;

    async fn update(&self, review: Review) -> AppResult<Review>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

pub struct ReviewStore {
    db: DatabaseConnection,
}

impl ReviewStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReviewRepository for ReviewStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Review>> {
        let model = ReviewEntity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Review::from))
    }

    async fn find_by_author(&self, user_id: Uuid, course_id: Uuid) -> AppResult<Option<Review>> {
        let model = ReviewEntity::find()
            .filter(review::Column::UserId.eq(user_id))
            .filter(review::Column::CourseId.eq(course_id))
            .one(&self.db)
            .await?;
        Ok(model.map(Review::from))
    }

    async fn list_by_course(
        &self,
        course_id: Uuid,
        params: PaginationParams,
    ) -> AppResult<(Vec<Review>, u64)> {
        let select = ReviewEntity::find()
            .filter(review::Column::CourseId.eq(course_id))
            .order_by_desc(review::Column::CreatedAt);

        let (models, total) = fetch_page(select, &self.db, &params).await?;
        Ok((models.into_iter().map(Review::from).collect(), total))
    }

    async fn summary(&self, course_id: Uuid) -> AppResult<RatingSummary> {
        let ratings: Vec<i16> = ReviewEntity::find()
            .select_only()
            .column(review::Column::Rating)
            .filter(review::Column::CourseId.eq(course_id))
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(RatingSummary::from_ratings(&ratings))
    }

    async fn list_all(&self) -> AppResult<Vec<Review>> {
        let models = ReviewEntity::find().all(&self.db).await?;
        Ok(models.into_iter().map(Review::from).collect())
    }

    async fn insert(&self, review: Review) -> AppResult<Review> {
        let model = ActiveModel {
            id: Set(review.id),
            course_id: Set(review.course_id),
            user_id: Set(review.user_id),
            author_name: Set(review.author_name),
            rating: Set(review.rating),
            comment: Set(review.comment),
            created_at: Set(review.created_at),
            updated_at: Set(review.updated_at),
        }
        .insert(&self.db)
        .await
        .map_err(|e| conflict_on_unique(e, "You have already reviewed this course"))?;

        Ok(Review::from(model))
    }

    async fn update(&self, review: Review) -> AppResult<Review> {
        let existing = ReviewEntity::find_by_id(review.id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = existing.into();
        active.rating = Set(review.rating);
        active.comment = Set(review.comment);
        active.updated_at = Set(chrono::Utc::now());

        Ok(Review::from(active.update(&self.db).await?))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = ReviewEntity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
