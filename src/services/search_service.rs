//! Full-text search over the document store.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::search::rank;
use crate::domain::{SearchCorpus, SearchQuery, SearchResponse};
use crate::errors::AppResult;
use crate::infra::{load_collection, Collection, DocumentStore};

#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, q: &str, limit: Option<usize>) -> AppResult<SearchResponse>;
}

/// Searches the mirrored collections; the relational store is never queried.
pub struct SearchEngine {
    documents: Arc<dyn DocumentStore>,
}

impl SearchEngine {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    async fn corpus(&self) -> AppResult<SearchCorpus> {
        let store = self.documents.as_ref();
        Ok(SearchCorpus {
            courses: load_collection(store, Collection::Courses).await?,
            lessons: load_collection(store, Collection::Lessons).await?,
            categories: load_collection(store, Collection::Categories).await?,
            instructors: load_collection(store, Collection::Instructors).await?,
            reviews: load_collection(store, Collection::Reviews).await?,
        })
    }
}

#[async_trait]
impl SearchService for SearchEngine {
    async fn search(&self, q: &str, limit: Option<usize>) -> AppResult<SearchResponse> {
        let query = SearchQuery::parse(q, limit)?;
        let corpus = self.corpus().await?;
        let hits = rank(&query, &corpus);

        tracing::debug!(query = %query.text, hits = hits.len(), "Search served");
        Ok(SearchResponse {
            query: query.text,
            total: hits.len(),
            hits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, CourseStatus, HitKind};
    use crate::errors::AppError;
    use crate::infra::{DualWriter, InMemoryDocumentStore};
    use crate::services::test_support::{course, lesson};
    use uuid::Uuid;

    async fn engine_with_catalog() -> SearchEngine {
        let store = Arc::new(InMemoryDocumentStore::new());
        let writer = DualWriter::new(store.clone());

        let published = course(Uuid::new_v4(), CourseStatus::Published, 1000);
        let mut draft = course(Uuid::new_v4(), CourseStatus::Draft, 1000);
        draft.title = "Rust Secrets".into();
        let mut hidden = lesson(draft.id, 1);
        hidden.title = "Rust internals".into();
        let mut visible = lesson(published.id, 1);
        visible.title = "Ownership in Rust".into();
        let category = Category {
            id: Uuid::new_v4(),
            name: "Systems Programming".into(),
            slug: "systems-programming".into(),
            description: Some("Rust, C and friends".into()),
        };

        writer.mirror(Collection::Courses, published.id, &published).await;
        writer.mirror(Collection::Courses, draft.id, &draft).await;
        writer.mirror(Collection::Lessons, hidden.id, &hidden).await;
        writer.mirror(Collection::Lessons, visible.id, &visible).await;
        writer.mirror(Collection::Categories, category.id, &category).await;

        SearchEngine::new(store)
    }

    #[tokio::test]
    async fn test_search_skips_unpublished_content() {
        let engine = engine_with_catalog().await;
        let response = engine.search("rust", None).await.unwrap();

        assert_eq!(response.query, "rust");
        assert_eq!(response.total, 3);
        assert!(response.hits.iter().all(|h| h.title != "Rust Secrets"));
        assert!(response.hits.iter().all(|h| h.title != "Rust internals"));
        assert_eq!(response.hits[0].kind, HitKind::Course);
    }

    #[tokio::test]
    async fn test_search_limit() {
        let engine = engine_with_catalog().await;
        let response = engine.search("  RUST ", Some(1)).await.unwrap();
        assert_eq!(response.hits.len(), 1);
    }

    #[tokio::test]
    async fn test_short_query_rejected() {
        let engine = engine_with_catalog().await;
        assert!(matches!(
            engine.search(" r ", None).await,
            Err(AppError::Validation(_))
        ));
    }
}
