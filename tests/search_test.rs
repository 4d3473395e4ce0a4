//! Search ranking over a hand-built corpus and over the document store.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use course_market::domain::search::rank;
use course_market::domain::{
    Category, Course, CourseStatus, HitKind, InstructorProfile, Review, SearchCorpus, SearchQuery,
};
use course_market::infra::{Collection, DocumentStore, InMemoryDocumentStore};
use course_market::services::{SearchEngine, SearchService};

fn course(title: &str, status: CourseStatus) -> Course {
    let now = Utc::now();
    Course {
        id: Uuid::new_v4(),
        instructor_id: Uuid::new_v4(),
        category_id: None,
        title: title.into(),
        slug: title.to_lowercase().replace(' ', "-"),
        subtitle: None,
        description: None,
        price_cents: 1999,
        currency: "usd".into(),
        thumbnail_url: None,
        status,
        created_at: now,
        updated_at: now,
        published_at: None,
    }
}

fn review(course_id: Uuid, comment: &str) -> Review {
    let now = Utc::now();
    Review {
        id: Uuid::new_v4(),
        course_id,
        user_id: Uuid::new_v4(),
        author_name: "Grace".into(),
        rating: 5,
        comment: Some(comment.into()),
        created_at: now,
        updated_at: now,
    }
}

fn corpus() -> SearchCorpus {
    let published = course("Rust", CourseStatus::Published);
    let draft = course("Rust Unreleased", CourseStatus::Draft);

    SearchCorpus {
        reviews: vec![
            review(published.id, "great rust course"),
            review(draft.id, "rust preview was fun"),
        ],
        courses: vec![published, draft],
        lessons: Vec::new(),
        categories: vec![Category {
            id: Uuid::new_v4(),
            name: "Rust Programming".into(),
            slug: "rust-programming".into(),
            description: None,
        }],
        instructors: vec![InstructorProfile {
            id: Uuid::new_v4(),
            name: "Ferris".into(),
            bio: Some("I teach rust".into()),
        }],
    }
}

#[test]
fn test_ranking_order_follows_field_weight_and_boost() {
    let query = SearchQuery::parse("Rust", None).unwrap();
    let hits = rank(&query, &corpus());

    let kinds: Vec<HitKind> = hits.iter().map(|h| h.kind).collect();
    assert_eq!(
        kinds,
        vec![
            HitKind::Course,
            HitKind::Category,
            HitKind::Instructor,
            HitKind::Review
        ]
    );
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(hits[0].course_slug.as_deref(), Some("rust"));
}

#[test]
fn test_draft_courses_and_their_reviews_are_invisible() {
    let query = SearchQuery::parse("unreleased", None).unwrap();
    assert!(rank(&query, &corpus()).is_empty());

    let query = SearchQuery::parse("preview", None).unwrap();
    assert!(rank(&query, &corpus()).is_empty());
}

#[test]
fn test_query_normalization_and_limit() {
    let query = SearchQuery::parse("  RUST   Programming ", Some(500)).unwrap();
    assert_eq!(query.text, "rust   programming");
    assert_eq!(query.tokens, vec!["rust", "programming"]);
    assert_eq!(query.limit, 50);

    let query = SearchQuery::parse("rust", Some(1)).unwrap();
    assert_eq!(rank(&query, &corpus()).len(), 1);

    assert!(SearchQuery::parse("r", None).is_err());
}

#[tokio::test]
async fn test_engine_reads_mirrored_documents() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let corpus = corpus();

    for course in &corpus.courses {
        store
            .upsert(
                Collection::Courses,
                course.id,
                serde_json::to_value(course).unwrap(),
            )
            .await
            .unwrap();
    }
    for category in &corpus.categories {
        store
            .upsert(
                Collection::Categories,
                category.id,
                serde_json::to_value(category).unwrap(),
            )
            .await
            .unwrap();
    }
    // Stray documents that no longer decode are skipped
    store
        .upsert(
            Collection::Courses,
            Uuid::new_v4(),
            serde_json::json!({"title": "Rust legacy"}),
        )
        .await
        .unwrap();

    let engine = SearchEngine::new(store);
    let response = engine.search("rust", None).await.unwrap();

    assert_eq!(response.query, "rust");
    assert_eq!(response.total, 2);
    assert_eq!(response.hits[0].kind, HitKind::Course);
    assert_eq!(response.hits[1].kind, HitKind::Category);
}
