//! Lessons belong to exactly one course and are ordered by `position`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::config::MAX_LESSON_DURATION_SECONDS;
use crate::errors::{AppError, AppResult};

/// Lesson entity; also the `lessons` document shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Lesson {
    pub id: Uuid,
    pub course_id: Uuid,
    #[schema(example = "Ownership and borrowing")]
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    /// 0 when unknown
    pub duration_seconds: i64,
    /// 1-based, dense within the course
    pub position: i32,
    pub is_preview: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lesson {
    /// Public outline entry. The video URL is only exposed for previews.
    pub fn outline(&self) -> LessonOutline {
        LessonOutline {
            id: self.id,
            title: self.title.clone(),
            slug: self.slug.clone(),
            position: self.position,
            duration_seconds: self.duration_seconds,
            is_preview: self.is_preview,
            video_url: if self.is_preview {
                self.video_url.clone()
            } else {
                None
            },
        }
    }

    /// Copy with the video URL removed, for callers without access.
    pub fn locked(mut self) -> Self {
        self.video_url = None;
        self
    }
}

/// Lesson as listed on a course page
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LessonOutline {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub position: i32,
    pub duration_seconds: i64,
    pub is_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

/// Lesson creation input
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewLesson {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    #[schema(example = "Ownership and borrowing")]
    pub title: String,
    #[validate(length(max = 20000, message = "Description is too long"))]
    pub description: Option<String>,
    #[validate(url(message = "Video must be a URL"))]
    pub video_url: Option<String>,
    #[validate(range(
        min = 0,
        max = MAX_LESSON_DURATION_SECONDS,
        message = "Duration must be between 0 and one week"
    ))]
    #[serde(default)]
    pub duration_seconds: i64,
    #[serde(default)]
    pub is_preview: bool,
}

/// Lesson update input
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct LessonPatch {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 20000, message = "Description is too long"))]
    pub description: Option<String>,
    #[validate(url(message = "Video must be a URL"))]
    pub video_url: Option<String>,
    #[validate(range(
        min = 0,
        max = MAX_LESSON_DURATION_SECONDS,
        message = "Duration must be between 0 and one week"
    ))]
    pub duration_seconds: Option<i64>,
    pub is_preview: Option<bool>,
}

/// New lesson order for a course
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ReorderLessons {
    #[validate(length(min = 1, message = "At least one lesson id is required"))]
    pub lesson_ids: Vec<Uuid>,
}

/// Check that `requested` is a permutation of `existing`.
pub fn ensure_permutation(existing: &[Uuid], requested: &[Uuid]) -> AppResult<()> {
    let unique: HashSet<&Uuid> = requested.iter().collect();
    if unique.len() != requested.len() {
        return Err(AppError::validation("Lesson ids must not repeat"));
    }

    let current: HashSet<&Uuid> = existing.iter().collect();
    if unique != current {
        return Err(AppError::validation(
            "Lesson ids must list every lesson of the course exactly once",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(is_preview: bool) -> Lesson {
        let now = Utc::now();
        Lesson {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            title: "Intro".into(),
            slug: "intro".into(),
            description: None,
            video_url: Some("https://cdn.example.com/v/1.mp4".into()),
            duration_seconds: 300,
            position: 1,
            is_preview,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_outline_hides_video_unless_preview() {
        assert!(lesson(false).outline().video_url.is_none());
        assert!(lesson(true).outline().video_url.is_some());
    }

    #[test]
    fn test_permutation() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        assert!(ensure_permutation(&[a, b, c], &[c, a, b]).is_ok());
        assert!(ensure_permutation(&[a, b, c], &[a, b]).is_err());
        assert!(ensure_permutation(&[a, b], &[a, a]).is_err());
        assert!(ensure_permutation(&[a, b], &[a, c]).is_err());
    }

    #[test]
    fn test_duration_bounds() {
        let input = |duration_seconds| NewLesson {
            title: "Intro".into(),
            description: None,
            video_url: None,
            duration_seconds,
            is_preview: false,
        };
        assert!(input(MAX_LESSON_DURATION_SECONDS).validate().is_ok());
        assert!(input(MAX_LESSON_DURATION_SECONDS + 1).validate().is_err());
        assert!(input(-1).validate().is_err());

        let patch = LessonPatch {
            duration_seconds: Some(i64::MAX / 2),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }
}
