//! Course aggregate and its publication lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::{Actor, Category, InstructorProfile, LessonOutline, RatingSummary};
use crate::errors::{AppError, AppResult};

/// Publication state of a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Draft,
    Published,
    Archived,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Draft => "draft",
            CourseStatus::Published => "published",
            CourseStatus::Archived => "archived",
        }
    }
}

impl From<&str> for CourseStatus {
    fn from(s: &str) -> Self {
        match s {
            "published" => CourseStatus::Published,
            "archived" => CourseStatus::Archived,
            _ => CourseStatus::Draft,
        }
    }
}

impl std::fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Course entity; also the `courses` document shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Course {
    pub id: Uuid,
    pub instructor_id: Uuid,
    pub category_id: Option<Uuid>,
    #[schema(example = "Rust for Web Developers")]
    pub title: String,
    #[schema(example = "rust-for-web-developers")]
    pub slug: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    /// Price in the smallest currency unit; 0 means free
    #[schema(example = 4999)]
    pub price_cents: i64,
    #[schema(example = "usd")]
    pub currency: String,
    pub thumbnail_url: Option<String>,
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Course {
    pub fn is_published(&self) -> bool {
        self.status == CourseStatus::Published
    }

    pub fn is_free(&self) -> bool {
        self.price_cents == 0
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.instructor_id == user_id
    }

    /// Owners and admins may edit a course.
    pub fn ensure_editable_by(&self, actor: &Actor) -> AppResult<()> {
        if self.is_owned_by(actor.id) || actor.role.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Published and not authored by `user_id`: the precondition for buying
    /// or enrolling.
    pub fn ensure_purchasable_by(&self, user_id: Uuid) -> AppResult<()> {
        if !self.is_published() {
            return Err(AppError::bad_request(format!(
                "Course '{}' is not available",
                self.title
            )));
        }
        if self.is_owned_by(user_id) {
            return Err(AppError::bad_request(format!(
                "You are the instructor of '{}'",
                self.title
            )));
        }
        Ok(())
    }

    /// Draft or archived → published. Needs at least one lesson.
    pub fn publish(&mut self, lesson_count: u64) -> AppResult<()> {
        if self.is_published() {
            return Err(AppError::conflict("Course is already published"));
        }
        if lesson_count == 0 {
            return Err(AppError::validation(
                "A course needs at least one lesson before it can be published",
            ));
        }

        let now = Utc::now();
        self.status = CourseStatus::Published;
        self.published_at.get_or_insert(now);
        self.updated_at = now;
        Ok(())
    }

    /// Published → draft.
    pub fn unpublish(&mut self) -> AppResult<()> {
        if !self.is_published() {
            return Err(AppError::conflict("Course is not published"));
        }
        self.status = CourseStatus::Draft;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Any state → archived.
    pub fn archive(&mut self) -> AppResult<()> {
        if self.status == CourseStatus::Archived {
            return Err(AppError::conflict("Course is already archived"));
        }
        self.status = CourseStatus::Archived;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Course creation input
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewCourse {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    #[schema(example = "Rust for Web Developers")]
    pub title: String,
    #[validate(length(max = 300, message = "Subtitle is too long"))]
    pub subtitle: Option<String>,
    #[validate(length(max = 20000, message = "Description is too long"))]
    pub description: Option<String>,
    #[validate(range(min = 0, max = 10_000_000, message = "Price is out of range"))]
    #[schema(example = 4999)]
    pub price_cents: i64,
    pub category_id: Option<Uuid>,
    #[validate(url(message = "Thumbnail must be a URL"))]
    pub thumbnail_url: Option<String>,
}

/// Course update input; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CoursePatch {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 300, message = "Subtitle is too long"))]
    pub subtitle: Option<String>,
    #[validate(length(max = 20000, message = "Description is too long"))]
    pub description: Option<String>,
    #[validate(range(min = 0, max = 10_000_000, message = "Price is out of range"))]
    pub price_cents: Option<i64>,
    pub category_id: Option<Uuid>,
    #[validate(url(message = "Thumbnail must be a URL"))]
    pub thumbnail_url: Option<String>,
}

/// Public course listing filter
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CourseFilter {
    /// Category slug
    pub category: Option<String>,
    pub instructor_id: Option<Uuid>,
    /// Case-insensitive title match
    pub q: Option<String>,
}

/// Everything the course landing page shows
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CourseDetail {
    pub course: Course,
    pub instructor: InstructorProfile,
    pub category: Option<Category>,
    pub lessons: Vec<LessonOutline>,
    pub rating: RatingSummary,
    pub lesson_count: u32,
    pub total_duration_seconds: i64,
}

/// Public instructor page
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InstructorPage {
    pub instructor: InstructorProfile,
    /// Published courses only
    pub courses: Vec<Course>,
}
