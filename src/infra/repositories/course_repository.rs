//! Course repository.

use async_trait::async_trait;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use super::base::{conflict_on_unique, fetch_page};
use super::entities::{
    cart_item, course::{self, ActiveModel, Entity as CourseEntity}, lesson, lesson_progress, review,
};
use crate::domain::{Course, CourseStatus};
use crate::errors::{AppError, AppResult};
use crate::infra::unit_of_work::transaction;
use crate::types::PaginationParams;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Filter for the public catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogQuery {
    pub category_id: Option<Uuid>,
    pub instructor_id: Option<Uuid>,
    /// Case-insensitive title fragment
    pub title: Option<String>,
}

/// Rows removed alongside a course
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseRemoval {
    pub lesson_ids: Vec<Uuid>,
    pub review_ids: Vec<Uuid>,
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Course>>;

    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Course>>;

    async fn find_many(&self, ids: Vec<Uuid>) -> AppResult<Vec<Course>>;

    /// Published courses matching `query`, newest first
    async fn list_published(
        &self,
        query: CatalogQuery,
        params: PaginationParams,
    ) -> AppResult<(Vec<Course>, u64)>;

    /// Every course of an instructor, any status
    async fn list_by_instructor(&self, instructor_id: Uuid) -> AppResult<Vec<Course>>;

    async fn list_all(&self) -> AppResult<Vec<Course>>;

    /// Slugs equal to `base` or starting with `base-`
    async fn slugs_like(&self, base: &str) -> AppResult<Vec<String>>;

    async fn insert(&self, course: Course) -> AppResult<Course>;

    /// Persist every mutable field of `course`
    async fn update(&self, course: Course) -> AppResult<Course>;

    /// Remove a course with its lessons, progress, reviews and cart entries
    async fn delete(&self, id: Uuid) -> AppResult<CourseRemoval>;
}

pub struct CourseStore {
    db: DatabaseConnection,
}

impl CourseStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CourseRepository for CourseStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Course>> {
        let model = CourseEntity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Course::from))
    }

    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Course>> {
        let model = CourseEntity::find()
            .filter(course::Column::Slug.eq(slug))
            .one(&self.db)
            .await?;
        Ok(model.map(Course::from))
    }

    async fn find_many(&self, ids: Vec<Uuid>) -> AppResult<Vec<Course>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = CourseEntity::find()
            .filter(course::Column::Id.is_in(ids))
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Course::from).collect())
    }

    async fn list_published(
        &self,
        query: CatalogQuery,
        params: PaginationParams,
    ) -> AppResult<(Vec<Course>, u64)> {
        let mut select = CourseEntity::find()
            .filter(course::Column::Status.eq(CourseStatus::Published.as_str()));

        if let Some(category_id) = query.category_id {
            select = select.filter(course::Column::CategoryId.eq(category_id));
        }
        if let Some(instructor_id) = query.instructor_id {
            select = select.filter(course::Column::InstructorId.eq(instructor_id));
        }
        if let Some(title) = query.title.filter(|t| !t.trim().is_empty()) {
            let pattern = format!("%{}%", title.trim().to_lowercase());
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(course::Column::Title))).like(pattern),
            );
        }

        let select = select.order_by_desc(course::Column::PublishedAt);
        let (models, total) = fetch_page(select, &self.db, &params).await?;
        Ok((models.into_iter().map(Course::from).collect(), total))
    }

    async fn list_by_instructor(&self, instructor_id: Uuid) -> AppResult<Vec<Course>> {
        let models = CourseEntity::find()
            .filter(course::Column::InstructorId.eq(instructor_id))
            .order_by_desc(course::Column::UpdatedAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Course::from).collect())
    }

    async fn list_all(&self) -> AppResult<Vec<Course>> {
        let models = CourseEntity::find().all(&self.db).await?;
        Ok(models.into_iter().map(Course::from).collect())
    }

    async fn slugs_like(&self, base: &str) -> AppResult<Vec<String>> {
        let slugs: Vec<String> = CourseEntity::find()
            .select_only()
            .column(course::Column::Slug)
            .filter(
                course::Column::Slug
                    .eq(base)
                    .or(course::Column::Slug.starts_with(format!("{}-", base))),
            )
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(slugs)
    }

    async fn insert(&self, course: Course) -> AppResult<Course> {
        let model = ActiveModel {
            id: Set(course.id),
            instructor_id: Set(course.instructor_id),
            category_id: Set(course.category_id),
            title: Set(course.title),
            slug: Set(course.slug),
            subtitle: Set(course.subtitle),
            description: Set(course.description),
            price_cents: Set(course.price_cents),
            currency: Set(course.currency),
            thumbnail_url: Set(course.thumbnail_url),
            status: Set(course.status.as_str().to_string()),
            created_at: Set(course.created_at),
            updated_at: Set(course.updated_at),
            published_at: Set(course.published_at),
        }
        .insert(&self.db)
        .await
        .map_err(|e| conflict_on_unique(e, "A course with this slug already exists"))?;

        Ok(Course::from(model))
    }

    async fn update(&self, course: Course) -> AppResult<Course> {
        let existing = CourseEntity::find_by_id(course.id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = existing.into();
        active.category_id = Set(course.category_id);
        active.title = Set(course.title);
        active.slug = Set(course.slug);
        active.subtitle = Set(course.subtitle);
        active.description = Set(course.description);
        active.price_cents = Set(course.price_cents);
        active.thumbnail_url = Set(course.thumbnail_url);
        active.status = Set(course.status.as_str().to_string());
        active.published_at = Set(course.published_at);
        active.updated_at = Set(chrono::Utc::now());

        let model = active
            .update(&self.db)
            .await
            .map_err(|e| conflict_on_unique(e, "A course with this slug already exists"))?;
        Ok(Course::from(model))
    }

    async fn delete(&self, id: Uuid) -> AppResult<CourseRemoval> {
        transaction(&self.db, move |txn| {
            Box::pin(async move {
                let lesson_ids: Vec<Uuid> = lesson::Entity::find()
                    .select_only()
                    .column(lesson::Column::Id)
                    .filter(lesson::Column::CourseId.eq(id))
                    .into_tuple()
                    .all(txn)
                    .await?;
                let review_ids: Vec<Uuid> = review::Entity::find()
                    .select_only()
                    .column(review::Column::Id)
                    .filter(review::Column::CourseId.eq(id))
                    .into_tuple()
                    .all(txn)
                    .await?;

                lesson_progress::Entity::delete_many()
                    .filter(lesson_progress::Column::CourseId.eq(id))
                    .exec(txn)
                    .await?;
                lesson::Entity::delete_many()
                    .filter(lesson::Column::CourseId.eq(id))
                    .exec(txn)
                    .await?;
                review::Entity::delete_many()
                    .filter(review::Column::CourseId.eq(id))
                    .exec(txn)
                    .await?;
                cart_item::Entity::delete_many()
                    .filter(cart_item::Column::CourseId.eq(id))
                    .exec(txn)
                    .await?;

                let result = CourseEntity::delete_by_id(id).exec(txn).await?;
                if result.rows_affected == 0 {
                    return Err(AppError::NotFound);
                }

                Ok(CourseRemoval {
                    lesson_ids,
                    review_ids,
                })
            })
        })
        .await
    }
}
