//! Rebuild document collections from the relational store.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::container::parallel;
use crate::domain::InstructorProfile;
use crate::errors::{AppError, AppResult};
use crate::infra::{Collection, DocumentStore, UnitOfWork};

/// Concurrent upserts per collection
const SYNC_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub collection: Collection,
    pub removed: u64,
    pub written: usize,
}

#[async_trait]
pub trait SyncService: Send + Sync {
    /// Clear and refill each collection. An empty slice means all of them.
    async fn sync(&self, collections: &[Collection]) -> AppResult<Vec<SyncReport>>;
}

pub struct Synchronizer<U: UnitOfWork> {
    uow: Arc<U>,
    documents: Arc<dyn DocumentStore>,
}

fn documents_of<T: Serialize>(rows: &[T], id: impl Fn(&T) -> Uuid) -> AppResult<Vec<(Uuid, Value)>> {
    rows.iter()
        .map(|row| {
            serde_json::to_value(row)
                .map(|doc| (id(row), doc))
                .map_err(|e| AppError::internal(format!("Document serialization failed: {}", e)))
        })
        .collect()
}

impl<U: UnitOfWork> Synchronizer<U> {
    pub fn new(uow: Arc<U>, documents: Arc<dyn DocumentStore>) -> Self {
        Self { uow, documents }
    }

    /// Current relational rows of a collection, as documents
    async fn source(&self, collection: Collection) -> AppResult<Vec<(Uuid, Value)>> {
        match collection {
            Collection::Courses => documents_of(&self.uow.courses().list_all().await?, |c| c.id),
            Collection::Lessons => documents_of(&self.uow.lessons().list_all().await?, |l| l.id),
            Collection::Categories => {
                documents_of(&self.uow.categories().list().await?, |c| c.id)
            }
            Collection::Instructors => {
                let profiles: Vec<InstructorProfile> = self
                    .uow
                    .users()
                    .list_instructors()
                    .await?
                    .iter()
                    .map(InstructorProfile::from)
                    .collect();
                documents_of(&profiles, |p| p.id)
            }
            Collection::Reviews => documents_of(&self.uow.reviews().list_all().await?, |r| r.id),
            Collection::Enrollments => {
                documents_of(&self.uow.enrollments().list_all().await?, |e| e.id)
            }
            Collection::Orders => documents_of(&self.uow.orders().list_all().await?, |o| o.id),
        }
    }

    async fn rebuild(&self, collection: Collection) -> AppResult<SyncReport> {
        let docs = self.source(collection).await?;
        let removed = self.documents.clear(collection).await?;

        let written = docs.len();
        let store = self.documents.clone();
        parallel::join_all_limited(
            docs.into_iter().map(|(id, doc)| {
                let store = store.clone();
                async move { store.upsert(collection, id, doc).await }
            }),
            SYNC_CONCURRENCY,
        )
        .await?;

        tracing::info!(%collection, removed, written, "Collection rebuilt");
        Ok(SyncReport {
            collection,
            removed,
            written,
        })
    }
}

#[async_trait]
impl<U: UnitOfWork> SyncService for Synchronizer<U> {
    async fn sync(&self, collections: &[Collection]) -> AppResult<Vec<SyncReport>> {
        let targets: &[Collection] = if collections.is_empty() {
            &Collection::ALL
        } else {
            collections
        };

        let mut reports = Vec::with_capacity(targets.len());
        for collection in targets {
            reports.push(self.rebuild(*collection).await?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, CourseStatus, UserRole};
    use crate::infra::InMemoryDocumentStore;
    use crate::services::test_support::{course, user, Mocks};
    use serde_json::json;

    #[tokio::test]
    async fn test_sync_replaces_stale_documents() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .upsert(Collection::Courses, Uuid::new_v4(), json!({"stale": true}))
            .await
            .unwrap();

        let instructor = Uuid::new_v4();
        let mut mocks = Mocks::default();
        mocks.courses.expect_list_all().returning(move || {
            Ok(vec![
                course(instructor, CourseStatus::Published, 1000),
                course(instructor, CourseStatus::Draft, 0),
            ])
        });

        let sync = Synchronizer::new(mocks.into_uow(), store.clone());
        let reports = sync.sync(&[Collection::Courses]).await.unwrap();

        assert_eq!(
            reports,
            vec![SyncReport {
                collection: Collection::Courses,
                removed: 1,
                written: 2,
            }]
        );
        assert_eq!(store.len(Collection::Courses).await, 2);
    }

    #[tokio::test]
    async fn test_sync_everything() {
        let store = Arc::new(InMemoryDocumentStore::new());

        let mut mocks = Mocks::default();
        mocks.courses.expect_list_all().returning(|| Ok(Vec::new()));
        mocks.lessons.expect_list_all().returning(|| Ok(Vec::new()));
        mocks.categories.expect_list().returning(|| {
            Ok(vec![Category {
                id: Uuid::new_v4(),
                name: "Design".into(),
                slug: "design".into(),
                description: None,
            }])
        });
        mocks
            .users
            .expect_list_instructors()
            .returning(|| Ok(vec![user(UserRole::Instructor)]));
        mocks.reviews.expect_list_all().returning(|| Ok(Vec::new()));
        mocks.enrollments.expect_list_all().returning(|| Ok(Vec::new()));
        mocks.orders.expect_list_all().returning(|| Ok(Vec::new()));

        let sync = Synchronizer::new(mocks.into_uow(), store.clone());
        let reports = sync.sync(&[]).await.unwrap();

        assert_eq!(reports.len(), Collection::ALL.len());
        assert_eq!(store.len(Collection::Categories).await, 1);
        assert_eq!(store.len(Collection::Instructors).await, 1);
    }
}
