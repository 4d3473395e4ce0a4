//! Course catalog and authoring handlers.
//!
//! Public reads go through the published catalog; every write is checked
//! against course ownership inside the course service.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use uuid::Uuid;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{Course, CourseDetail, CourseFilter, CoursePatch, NewCourse};
use crate::errors::AppResult;
use crate::types::{CoursePage, PaginationParams};

pub fn course_routes() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses).post(create_course))
        // One parameter name per segment; on GET it carries the slug.
        .route("/courses/:id", get(get_course))
        .route("/courses/:id/manage", patch(update_course).delete(delete_course))
        .route("/courses/:id/publish", post(publish_course))
        .route("/courses/:id/unpublish", post(unpublish_course))
        .route("/courses/:id/archive", post(archive_course))
        .route("/instructor/courses", get(my_courses))
}

/// Browse published courses
#[utoipa::path(
    get,
    path = "/courses",
    tag = "Courses",
    params(CourseFilter, PaginationParams),
    responses(
        (status = 200, description = "Page of published courses", body = CoursePage)
    )
)]
pub async fn list_courses(
    State(state): State<AppState>,
    Query(filter): Query<CourseFilter>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<CoursePage>> {
    let page = state
        .services
        .courses()
        .list_published(filter, params)
        .await?;
    Ok(Json(page))
}

/// Course landing page
#[utoipa::path(
    get,
    path = "/courses/{slug}",
    tag = "Courses",
    params(
        ("slug" = String, Path, description = "Course slug")
    ),
    responses(
        (status = 200, description = "Course with instructor, outline and rating", body = CourseDetail),
        (status = 404, description = "Course not found or not published")
    )
)]
pub async fn get_course(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<CourseDetail>> {
    let detail = state
        .services
        .courses()
        .get_published_by_slug(&slug)
        .await?;
    Ok(Json(detail))
}

/// Create a draft course (instructor or admin)
#[utoipa::path(
    post,
    path = "/courses",
    tag = "Courses",
    security(("bearer_auth" = [])),
    request_body = NewCourse,
    responses(
        (status = 201, description = "Draft course created", body = Course),
        (status = 400, description = "Validation error or unknown category"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Instructors only")
    )
)]
pub async fn create_course(
    current_user: CurrentUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<NewCourse>,
) -> AppResult<(StatusCode, Json<Course>)> {
    let course = state
        .services
        .courses()
        .create_course(&current_user.actor(), payload)
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// Courses authored by the caller, in every status
#[utoipa::path(
    get,
    path = "/instructor/courses",
    tag = "Courses",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own courses", body = Vec<Course>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Instructors only")
    )
)]
pub async fn my_courses(
    current_user: CurrentUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Course>>> {
    let courses = state
        .services
        .courses()
        .list_for_instructor(&current_user.actor())
        .await?;
    Ok(Json(courses))
}

/// Edit a course (owner or admin)
#[utoipa::path(
    patch,
    path = "/courses/{id}/manage",
    tag = "Courses",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    request_body = CoursePatch,
    responses(
        (status = 200, description = "Course updated", body = Course),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Forbidden - Not the owner"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn update_course(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<CoursePatch>,
) -> AppResult<Json<Course>> {
    let course = state
        .services
        .courses()
        .update_course(&current_user.actor(), id, payload)
        .await?;
    Ok(Json(course))
}

/// Delete a course and its lessons (owner or admin)
#[utoipa::path(
    delete,
    path = "/courses/{id}/manage",
    tag = "Courses",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    responses(
        (status = 204, description = "Course deleted"),
        (status = 403, description = "Forbidden - Not the owner"),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Course has enrollments")
    )
)]
pub async fn delete_course(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state
        .services
        .courses()
        .delete_course(&current_user.actor(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Publish a course with at least one lesson
#[utoipa::path(
    post,
    path = "/courses/{id}/publish",
    tag = "Courses",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Course published", body = Course),
        (status = 400, description = "Course has no lessons"),
        (status = 403, description = "Forbidden - Not the owner"),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Transition not allowed")
    )
)]
pub async fn publish_course(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Course>> {
    let course = state
        .services
        .courses()
        .publish(&current_user.actor(), id)
        .await?;
    Ok(Json(course))
}

/// Return a published course to draft
#[utoipa::path(
    post,
    path = "/courses/{id}/unpublish",
    tag = "Courses",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Course unpublished", body = Course),
        (status = 403, description = "Forbidden - Not the owner"),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Transition not allowed")
    )
)]
pub async fn unpublish_course(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Course>> {
    let course = state
        .services
        .courses()
        .unpublish(&current_user.actor(), id)
        .await?;
    Ok(Json(course))
}

/// Archive a course; enrolled students keep access
#[utoipa::path(
    post,
    path = "/courses/{id}/archive",
    tag = "Courses",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Course archived", body = Course),
        (status = 403, description = "Forbidden - Not the owner"),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Transition not allowed")
    )
)]
pub async fn archive_course(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Course>> {
    let course = state
        .services
        .courses()
        .archive(&current_user.actor(), id)
        .await?;
    Ok(Json(course))
}
