//! Category management.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::slug::{slugify, unique_slug};
use crate::domain::{Category, CategoryPatch, NewCategory};
use crate::errors::{AppResult, OptionExt};
use crate::infra::{Collection, DualWriter, UnitOfWork};

#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn list_categories(&self) -> AppResult<Vec<Category>>;

    async fn create_category(&self, input: NewCategory) -> AppResult<Category>;

    async fn update_category(&self, id: Uuid, patch: CategoryPatch) -> AppResult<Category>;

    /// Delete a category; its courses become uncategorized.
    async fn delete_category(&self, id: Uuid) -> AppResult<()>;
}

pub struct CatalogManager<U: UnitOfWork> {
    uow: Arc<U>,
    writer: DualWriter,
}

impl<U: UnitOfWork> CatalogManager<U> {
    pub fn new(uow: Arc<U>, writer: DualWriter) -> Self {
        Self { uow, writer }
    }

    async fn free_slug(&self, name: &str, current: Option<&str>) -> AppResult<String> {
        let base = slugify(name);
        let taken: HashSet<String> = self
            .uow
            .categories()
            .slugs_like(&base)
            .await?
            .into_iter()
            .filter(|s| Some(s.as_str()) != current)
            .collect();
        Ok(unique_slug(&base, &taken))
    }
}

#[async_trait]
impl<U: UnitOfWork> CatalogService for CatalogManager<U> {
    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.uow.categories().list().await
    }

    async fn create_category(&self, input: NewCategory) -> AppResult<Category> {
        let name = input.name.trim().to_string();
        let category = Category {
            id: Uuid::new_v4(),
            slug: self.free_slug(&name, None).await?,
            name,
            description: input.description,
        };

        let category = self.uow.categories().create(category).await?;
        self.writer
            .mirror(Collection::Categories, category.id, &category)
            .await;
        Ok(category)
    }

    async fn update_category(&self, id: Uuid, patch: CategoryPatch) -> AppResult<Category> {
        let mut category = self
            .uow
            .categories()
            .find_by_id(id)
            .await?
            .ok_or_not_found()?;

        if let Some(name) = patch.name {
            let name = name.trim().to_string();
            if name != category.name {
                category.slug = self.free_slug(&name, Some(&category.slug)).await?;
                category.name = name;
            }
        }
        if let Some(description) = patch.description {
            category.description = Some(description).filter(|d| !d.trim().is_empty());
        }

        let category = self.uow.categories().update(category).await?;
        self.writer
            .mirror(Collection::Categories, category.id, &category)
            .await;
        Ok(category)
    }

    async fn delete_category(&self, id: Uuid) -> AppResult<()> {
        self.uow
            .categories()
            .find_by_id(id)
            .await?
            .ok_or_not_found()?;

        let detached = self.uow.categories().delete(id).await?;
        self.writer.remove(Collection::Categories, id).await;

        // Detached courses changed in the relational store too
        if !detached.is_empty() {
            for course in self.uow.courses().find_many(detached).await? {
                self.writer
                    .mirror(Collection::Courses, course.id, &course)
                    .await;
            }
        }

        tracing::info!(category_id = %id, "Category deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Course, CourseStatus};
    use crate::errors::AppError;
    use crate::infra::{DocumentStore, InMemoryDocumentStore};
    use crate::services::test_support::{course, memory_writer, Mocks, TestUnitOfWork};

    fn service(mocks: Mocks) -> (CatalogManager<TestUnitOfWork>, Arc<InMemoryDocumentStore>) {
        let (writer, store) = memory_writer();
        (CatalogManager::new(mocks.into_uow(), writer), store)
    }

    fn category(name: &str, slug: &str) -> Category {
        Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slug.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_create_picks_free_slug() {
        let mut mocks = Mocks::default();
        mocks
            .categories
            .expect_slugs_like()
            .returning(|_| Ok(vec!["web-development".into()]));
        mocks.categories.expect_create().returning(Ok);

        let (service, store) = service(mocks);
        let created = service
            .create_category(NewCategory {
                name: " Web Development ".into(),
                description: None,
            })
            .await
            .unwrap();

        assert_eq!(created.name, "Web Development");
        assert_eq!(created.slug, "web-development-2");
        assert!(store
            .get(Collection::Categories, created.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_rename_keeps_own_slug_out_of_the_way() {
        let existing = category("Data", "data");
        let id = existing.id;

        let mut mocks = Mocks::default();
        mocks
            .categories
            .expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        mocks
            .categories
            .expect_slugs_like()
            .returning(|_| Ok(vec!["data-science".into()]));
        mocks.categories.expect_update().returning(Ok);

        let (service, _) = service(mocks);
        let updated = service
            .update_category(
                id,
                CategoryPatch {
                    name: Some("Data Science".into()),
                    description: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.slug, "data-science-2");
    }

    #[tokio::test]
    async fn test_delete_remirrors_detached_courses() {
        let existing = category("Design", "design");
        let id = existing.id;
        let detached: Course = course(Uuid::new_v4(), CourseStatus::Published, 500);
        let detached_id = detached.id;

        let mut mocks = Mocks::default();
        mocks
            .categories
            .expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        mocks
            .categories
            .expect_delete()
            .returning(move |_| Ok(vec![detached_id]));
        mocks
            .courses
            .expect_find_many()
            .returning(move |_| Ok(vec![detached.clone()]));

        let (service, store) = service(mocks);
        service.delete_category(id).await.unwrap();

        assert!(store
            .get(Collection::Courses, detached_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_delete_missing_category() {
        let mut mocks = Mocks::default();
        mocks.categories.expect_find_by_id().returning(|_| Ok(None));

        let (service, _) = service(mocks);
        assert!(matches!(
            service.delete_category(Uuid::new_v4()).await,
            Err(AppError::NotFound)
        ));
    }
}
