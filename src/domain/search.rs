//! Relevance scoring across the searchable document collections.
//!
//! Every candidate is scored field by field against the normalized query:
//!
//! | match                 | points        |
//! |-----------------------|---------------|
//! | whole field equals q  | 10 × weight   |
//! | field starts with q   | 6 × weight    |
//! | field contains q      | 4 × weight    |
//! | each token contained  | +1 × weight   |
//!
//! Titles and names weigh 3, descriptive text weighs 1. The per-collection
//! boost (in percent) is applied to the sum.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{Category, Course, InstructorProfile, Lesson, Review};
use crate::config::{DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT, MIN_SEARCH_QUERY_LENGTH};
use crate::errors::{AppError, AppResult};

const PRIMARY_WEIGHT: u32 = 3;
const SECONDARY_WEIGHT: u32 = 1;

/// Kind of entity a hit points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HitKind {
    Course,
    Lesson,
    Category,
    Instructor,
    Review,
}

impl HitKind {
    /// Collection boost in percent
    pub fn boost(&self) -> u32 {
        match self {
            HitKind::Course => 120,
            HitKind::Category => 110,
            HitKind::Lesson | HitKind::Instructor => 100,
            HitKind::Review => 50,
        }
    }
}

/// `GET /search` query string
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct SearchParams {
    /// Search text, at least two characters
    pub q: String,
    /// Maximum number of hits (default 20, max 50)
    pub limit: Option<usize>,
}

/// Normalized query text and its whitespace tokens
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub tokens: Vec<String>,
    pub limit: usize,
}

impl SearchQuery {
    pub fn parse(raw: &str, limit: Option<usize>) -> AppResult<Self> {
        let text = raw.trim().to_lowercase();
        if text.chars().count() < MIN_SEARCH_QUERY_LENGTH {
            return Err(AppError::validation(format!(
                "Search query must be at least {} characters",
                MIN_SEARCH_QUERY_LENGTH
            )));
        }

        let tokens = text.split_whitespace().map(str::to_string).collect();
        let limit = limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT);

        Ok(Self { text, tokens, limit })
    }

    /// Score one field. Empty fields score 0.
    pub fn field_score(&self, field: &str, weight: u32) -> u32 {
        let field = field.trim().to_lowercase();
        if field.is_empty() {
            return 0;
        }

        let phrase = if field == self.text {
            10
        } else if field.starts_with(&self.text) {
            6
        } else if field.contains(&self.text) {
            4
        } else {
            0
        };

        let tokens = self
            .tokens
            .iter()
            .filter(|t| field.contains(t.as_str()))
            .count() as u32;

        (phrase + tokens) * weight
    }

    fn score(&self, kind: HitKind, primary: Option<&str>, secondary: &[Option<&str>]) -> u32 {
        let mut sum = primary.map_or(0, |p| self.field_score(p, PRIMARY_WEIGHT));
        sum += secondary
            .iter()
            .flatten()
            .map(|s| self.field_score(s, SECONDARY_WEIGHT))
            .sum::<u32>();
        sum * kind.boost() / 100
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SearchHit {
    pub kind: HitKind,
    pub id: Uuid,
    pub title: String,
    pub snippet: Option<String>,
    /// Slug of the course the hit belongs to, for linking
    pub course_slug: Option<String>,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchResponse {
    pub query: String,
    pub total: usize,
    pub hits: Vec<SearchHit>,
}

/// Documents loaded from the five searchable collections
#[derive(Debug, Clone, Default)]
pub struct SearchCorpus {
    pub courses: Vec<Course>,
    pub lessons: Vec<Lesson>,
    pub categories: Vec<Category>,
    pub instructors: Vec<InstructorProfile>,
    pub reviews: Vec<Review>,
}

/// Score every visible document, drop non-matches, sort and truncate.
///
/// Only published courses are visible; lessons and reviews are visible when
/// their course is.
pub fn rank(query: &SearchQuery, corpus: &SearchCorpus) -> Vec<SearchHit> {
    let published: HashMap<Uuid, &Course> = corpus
        .courses
        .iter()
        .filter(|c| c.is_published())
        .map(|c| (c.id, c))
        .collect();

    let mut hits = Vec::new();

    for course in published.values() {
        hits.push(SearchHit {
            kind: HitKind::Course,
            id: course.id,
            title: course.title.clone(),
            snippet: course.subtitle.clone(),
            course_slug: Some(course.slug.clone()),
            score: query.score(
                HitKind::Course,
                Some(&course.title),
                &[course.subtitle.as_deref(), course.description.as_deref()],
            ),
        });
    }

    for lesson in &corpus.lessons {
        let Some(course) = published.get(&lesson.course_id) else {
            continue;
        };
        hits.push(SearchHit {
            kind: HitKind::Lesson,
            id: lesson.id,
            title: lesson.title.clone(),
            snippet: lesson.description.clone(),
            course_slug: Some(course.slug.clone()),
            score: query.score(
                HitKind::Lesson,
                Some(&lesson.title),
                &[lesson.description.as_deref()],
            ),
        });
    }

    for category in &corpus.categories {
        hits.push(SearchHit {
            kind: HitKind::Category,
            id: category.id,
            title: category.name.clone(),
            snippet: category.description.clone(),
            course_slug: None,
            score: query.score(
                HitKind::Category,
                Some(&category.name),
                &[category.description.as_deref()],
            ),
        });
    }

    for instructor in &corpus.instructors {
        hits.push(SearchHit {
            kind: HitKind::Instructor,
            id: instructor.id,
            title: instructor.name.clone(),
            snippet: instructor.bio.clone(),
            course_slug: None,
            score: query.score(
                HitKind::Instructor,
                Some(&instructor.name),
                &[instructor.bio.as_deref()],
            ),
        });
    }

    for review in &corpus.reviews {
        let Some(course) = published.get(&review.course_id) else {
            continue;
        };
        hits.push(SearchHit {
            kind: HitKind::Review,
            id: review.id,
            title: course.title.clone(),
            snippet: review.comment.clone(),
            course_slug: Some(course.slug.clone()),
            score: query.score(HitKind::Review, None, &[review.comment.as_deref()]),
        });
    }

    hits.retain(|h| h.score > 0);
    hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.title.cmp(&b.title)));
    hits.truncate(query.limit);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(q: &str) -> SearchQuery {
        SearchQuery::parse(q, None).unwrap()
    }

    #[test]
    fn test_parse_normalizes_and_clamps() {
        let q = SearchQuery::parse("  Rust  Async ", Some(500)).unwrap();
        assert_eq!(q.text, "rust  async");
        assert_eq!(q.tokens, vec!["rust", "async"]);
        assert_eq!(q.limit, MAX_SEARCH_LIMIT);

        assert_eq!(query("rust").limit, DEFAULT_SEARCH_LIMIT);
        assert_eq!(SearchQuery::parse("ru", Some(0)).unwrap().limit, 1);
    }

    #[test]
    fn test_parse_rejects_short_query() {
        assert!(matches!(
            SearchQuery::parse(" a ", None),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_field_score_tiers() {
        let q = query("rust");
        assert_eq!(q.field_score("Rust", 1), 11);
        assert_eq!(q.field_score("Rust basics", 1), 7);
        assert_eq!(q.field_score("Learn rust", 1), 5);
        assert_eq!(q.field_score("Go", 1), 0);
        assert_eq!(q.field_score("", 3), 0);
        assert_eq!(q.field_score("Rust", 3), 33);
    }

    #[test]
    fn test_token_matches_without_phrase() {
        let q = query("async rust");
        // no phrase match, both tokens present
        assert_eq!(q.field_score("Rust and async", 1), 2);
    }

    #[test]
    fn test_boost_applies_to_sum() {
        let q = query("rust");
        let score = q.score(HitKind::Review, None, &[Some("rust")]);
        assert_eq!(score, 11 * 50 / 100);
    }
}
