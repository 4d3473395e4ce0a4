use async_trait::async_trait;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::base::conflict_on_unique;
use super::entities::{
    category::{self, ActiveModel, Entity as CategoryEntity},
    course::{self, Entity as CourseEntity},
};
use crate::domain::Category;
use crate::errors::{AppError, AppResult};
use crate::infra::unit_of_work::transaction;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// All categories ordered by name
    async fn list(&self) -> AppResult<Vec<Category>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Category>>;

    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Category>>;

    /// Slugs equal to `base` or starting with `base-`
    async fn slugs_like(&self, base: &str) -> AppResult<Vec<String>>;

    async fn create(&self, category: Category) -> AppResult<Category>;

    async fn update(&self, category: Category) -> AppResult<Category>;

    /// Delete a category and detach its courses. Returns the detached course ids.
    async fn delete(&self, id: Uuid) -> AppResult<Vec<Uuid>>;
}

pub struct CategoryStore {
    db: DatabaseConnection,
}

impl CategoryStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CategoryRepository for CategoryStore {
    async fn list(&self) -> AppResult<Vec<Category>> {
        let models = CategoryEntity::find()
            .order_by_asc(category::Column::Name)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Category::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Category>> {
        let model = CategoryEntity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Category::from))
    }

    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Category>> {
        let model = CategoryEntity::find()
            .filter(category::Column::Slug.eq(slug))
            .one(&self.db)
            .await?;
        Ok(model.map(Category::from))
    }

    async fn slugs_like(&self, base: &str) -> AppResult<Vec<String>> {
        let slugs: Vec<String> = CategoryEntity::find()
            .select_only()
            .column(category::Column::Slug)
            .filter(
                category::Column::Slug
                    .eq(base)
                    .or(category::Column::Slug.starts_with(format!("{}-", base))),
            )
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(slugs)
    }

    async fn create(&self, category: Category) -> AppResult<Category> {
        let model = ActiveModel {
            id: Set(category.id),
            name: Set(category.name),
            slug: Set(category.slug),
            description: Set(category.description),
            created_at: Set(chrono::Utc::now()),
        }
        .insert(&self.db)
        .await
        .map_err(|e| conflict_on_unique(e, "A category with this slug already exists"))?;

        Ok(Category::from(model))
    }

    async fn update(&self, category: Category) -> AppResult<Category> {
        let existing = CategoryEntity::find_by_id(category.id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = existing.into();
        active.name = Set(category.name);
        active.slug = Set(category.slug);
        active.description = Set(category.description);

        let model = active
            .update(&self.db)
            .await
            .map_err(|e| conflict_on_unique(e, "A category with this slug already exists"))?;
        Ok(Category::from(model))
    }

    async fn delete(&self, id: Uuid) -> AppResult<Vec<Uuid>> {
        transaction(&self.db, move |txn| {
            Box::pin(async move {
                let detached: Vec<Uuid> = CourseEntity::find()
                    .select_only()
                    .column(course::Column::Id)
                    .filter(course::Column::CategoryId.eq(id))
                    .into_tuple()
                    .all(txn)
                    .await?;

                CourseEntity::update_many()
                    .col_expr(course::Column::CategoryId, Expr::value(Option::<Uuid>::None))
                    .filter(course::Column::CategoryId.eq(id))
                    .exec(txn)
                    .await?;

                let result = CategoryEntity::delete_by_id(id).exec(txn).await?;
                if result.rows_affected == 0 {
                    return Err(AppError::NotFound);
                }

                Ok(detached)
            })
        })
        .await
    }
}
